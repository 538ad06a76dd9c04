/// Verification method selection
use crate::identity::{fragment_of, IdentityDocument, VerificationMethod};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Key Id not found in the did: {0}")]
    MissingFragment(String),

    #[error("Invalid DID document: verificationMethod not found")]
    NoVerificationMethods,

    #[error("Verification method with key {0} not found")]
    NotFound(String),
}

/// Pick the verification method whose fragment equals the fragment of `did`.
///
/// Exact match only. The first match in document order wins.
pub fn select_verification_method<'a>(
    document: &'a IdentityDocument,
    did: &str,
) -> Result<&'a VerificationMethod, SelectionError> {
    let key = fragment_of(did).ok_or_else(|| SelectionError::MissingFragment(did.to_string()))?;

    if document.verification_methods.is_empty() {
        return Err(SelectionError::NoVerificationMethods);
    }

    document
        .verification_methods
        .iter()
        .find(|method| fragment_of(&method.id) == Some(key))
        .ok_or_else(|| SelectionError::NotFound(key.to_string()))
}
