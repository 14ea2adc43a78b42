#[path = "integration/helpers.rs"]
mod helpers;

#[path = "integration/authorize_test.rs"]
mod authorize_test;
#[path = "integration/relay_test.rs"]
mod relay_test;
#[path = "integration/status_test.rs"]
mod status_test;
#[path = "integration/void_test.rs"]
mod void_test;
