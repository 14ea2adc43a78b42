//! Card fixtures built around the mock processor's test PANs.

use uuid::Uuid;

use tably_domain::card::PaymentData;

pub const PAN_VISA_SUCCESS: &str = "4242424242424242";
pub const PAN_MASTERCARD_SUCCESS: &str = "5555555555554444";
pub const PAN_GENERIC_DECLINE: &str = "4000000000000002";
pub const PAN_INSUFFICIENT_FUNDS: &str = "4000000000009995";
pub const PAN_TIMEOUT_ONCE: &str = "4000000000000119";
pub const PAN_RATE_LIMITED: &str = "4000000000009987";

pub fn test_card(pan: &str) -> PaymentData {
    PaymentData {
        card_number: pan.to_owned(),
        exp_month: 12,
        exp_year: 2030,
        cvv: Some("123".to_owned()),
        cardholder_name: Some("Jordan Diner".to_owned()),
        billing_zip: Some("94103".to_owned()),
    }
}

pub fn test_restaurant_id() -> Uuid {
    Uuid::parse_str("00000000-0000-0000-0000-00000000feed").unwrap()
}
