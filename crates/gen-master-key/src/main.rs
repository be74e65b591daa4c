use aes_gcm_siv::{
    Aes256GcmSiv,
    aead::{KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};

/// Prints a fresh key for `master-secret` in `app-config.toml`, the one
/// phone numbers are encrypted with.
fn main() {
    let key = Aes256GcmSiv::generate_key(&mut OsRng);
    let encoded_key = STANDARD_NO_PAD.encode(key.as_slice());
    println!("master-secret = \"{encoded_key}\"");
}
