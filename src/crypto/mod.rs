/// Cryptography for blockchain account keys
///
/// Handles secp256k1 signer recovery for `blockchainAccountId` verification methods

pub mod account;
