//! Card data and the non-sensitive metadata derived from it.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Decrypted card data. Exists in memory only between token decryption and
/// the processor call; zeroized on drop and never printed in full.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PaymentData {
    pub card_number: String,
    pub exp_month: u32,
    pub exp_year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardholder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_zip: Option<String>,
}

impl PaymentData {
    /// Last four digits of the PAN.
    pub fn last4(&self) -> String {
        let n = self.card_number.len();
        self.card_number[n.saturating_sub(4)..].to_owned()
    }

    /// Canonical serialized form used inside the encryption envelope.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// Manual Debug so a stray `{:?}` can never leak the PAN or CVV.
impl std::fmt::Debug for PaymentData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentData")
            .field("card_number", &format_args!("****{}", self.last4()))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvv", &self.cvv.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

/// Non-sensitive token metadata. Safe to store and return from the token
/// service's `Get` surface; never contains the PAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub card_brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

impl CardMetadata {
    pub fn from_payment_data(data: &PaymentData) -> Self {
        Self {
            card_brand: card_brand(&data.card_number).to_owned(),
            last4: data.last4(),
            exp_month: data.exp_month,
            exp_year: data.exp_year,
        }
    }
}

/// Simplified IIN-prefix brand detection.
pub fn card_brand(card_number: &str) -> &'static str {
    if card_number.starts_with('4') {
        "visa"
    } else if ["51", "52", "53", "54", "55"]
        .iter()
        .any(|p| card_number.starts_with(p))
    {
        "mastercard"
    } else if card_number.starts_with("34") || card_number.starts_with("37") {
        "amex"
    } else if card_number.starts_with("6011")
        || card_number.starts_with("65")
        || ["644", "645", "646", "647", "648", "649"]
            .iter()
            .any(|p| card_number.starts_with(p))
    {
        "discover"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visa() -> PaymentData {
        PaymentData {
            card_number: "4242424242424242".into(),
            exp_month: 12,
            exp_year: 2030,
            cvv: Some("123".into()),
            cardholder_name: Some("Jordan Diner".into()),
            billing_zip: None,
        }
    }

    #[test]
    fn should_detect_card_brands_by_iin_prefix() {
        assert_eq!(card_brand("4242424242424242"), "visa");
        assert_eq!(card_brand("5555555555554444"), "mastercard");
        assert_eq!(card_brand("378282246310005"), "amex");
        assert_eq!(card_brand("6011111111111117"), "discover");
        assert_eq!(card_brand("9999999999999999"), "unknown");
    }

    #[test]
    fn should_never_show_pan_or_cvv_in_debug_output() {
        let rendered = format!("{:?}", visa());
        assert!(!rendered.contains("4242424242424242"));
        assert!(!rendered.contains("123"));
        assert!(rendered.contains("****4242"));
    }

    #[test]
    fn should_round_trip_payment_data_through_envelope_bytes() {
        let data = visa();
        let bytes = data.to_bytes().unwrap();
        let back = PaymentData::from_bytes(&bytes).unwrap();
        assert_eq!(back.card_number, data.card_number);
        assert_eq!(back.cvv, data.cvv);
    }

    #[test]
    fn should_extract_metadata_without_pan() {
        let meta = CardMetadata::from_payment_data(&visa());
        assert_eq!(meta.card_brand, "visa");
        assert_eq!(meta.last4, "4242");
        assert_eq!(meta.exp_month, 12);
    }
}
