/// Legacy allow-list
///
/// Pre-approved issuers from sunset networks that are accepted without any
/// cryptographic check. Only active when explicitly enabled, outside
/// production, with at least one entry.
use crate::{
    config::{AllowListConfig, ServiceConfig},
    identity::{normalize_identifier, strip_orgid_prefix, IdentityDocument, ResolutionResult, ORGID_DID_PREFIX},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Organisations registered on Ropsten before it was shut down
const ROPSTEN_ORGIDS: &[(&str, &str)] = &[
    (
        "0x16bec77e1890c9c790b2e1c339a78ad561148e0cae7da9cb50c4c1cd64d77fe6",
        "EY Leisure (ropsten)",
    ),
    (
        "0xce981ebc76d3b45cac65565046ef11a096ecffdd8d1dd44cd3c47cfdac803ed6",
        "EY Business (ropsten)",
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct AllowListEntry {
    /// Bare organisation id, without `did:orgid:`
    pub org_id: String,
    pub comment: String,
    /// Substitute document served instead of a resolution
    pub document: Option<IdentityDocument>,
}

impl AllowListEntry {
    pub fn new(org_id: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            comment: comment.into(),
            document: None,
        }
    }

    /// Fixed resolution result standing in for a live resolution
    pub fn substitute_resolution(&self) -> ResolutionResult {
        let document = self
            .document
            .clone()
            .unwrap_or_else(|| IdentityDocument::new(format!("{}{}", ORGID_DID_PREFIX, self.org_id)));

        let mut metadata = Map::new();
        metadata.insert("allowListed".to_string(), Value::Bool(true));
        metadata.insert("comment".to_string(), Value::String(self.comment.clone()));

        ResolutionResult {
            document: Some(document),
            metadata,
            other: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LegacyAllowList {
    entries: Vec<AllowListEntry>,
}

impl LegacyAllowList {
    /// Inactive list
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Active list; an empty `entries` is still inactive
    pub fn with_entries(entries: Vec<AllowListEntry>) -> Self {
        Self { entries }
    }

    pub fn from_config(config: &AllowListConfig, service: &ServiceConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        if service.is_production() {
            warn!("WHITELIST_ENABLED is ignored in production");
            return Self::disabled();
        }

        let mut entries: Vec<AllowListEntry> = match &config.entries {
            Some(pairs) => pairs
                .iter()
                .map(|(org_id, comment)| AllowListEntry::new(strip_orgid_prefix(org_id), comment.as_str()))
                .collect(),
            None => ROPSTEN_ORGIDS
                .iter()
                .map(|(org_id, comment)| AllowListEntry::new(*org_id, *comment))
                .collect(),
        };

        if entries.is_empty() {
            warn!("Allow-list enabled without entries, leaving it off");
            return Self::disabled();
        }

        for (org_id, document) in &config.documents {
            let bare = strip_orgid_prefix(org_id);
            match entries
                .iter_mut()
                .find(|entry| entry.org_id.eq_ignore_ascii_case(bare))
            {
                Some(entry) => entry.document = Some(document.clone()),
                None => warn!("Substitute document for {} has no allow-list entry", org_id),
            }
        }

        warn!(
            "Allow-list active with {} issuer(s): signatures from these issuers are NOT verified",
            entries.len()
        );
        for entry in &entries {
            info!("Allow-listed ORGiD {} ({})", entry.org_id, entry.comment);
        }

        Self::with_entries(entries)
    }

    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Look up an identifier with or without `did:orgid:` and key fragment
    pub fn get(&self, identifier: &str) -> Option<&AllowListEntry> {
        let bare = strip_orgid_prefix(normalize_identifier(identifier));
        self.entries
            .iter()
            .find(|entry| entry.org_id.eq_ignore_ascii_case(bare))
    }
}
