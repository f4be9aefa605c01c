//! Early check that every profile a node needs exists on the remote.

use crate::error::ComposeError;
use crate::specs::{Group, Node};

/// Group common profiles followed by the node's own, without repeats.
pub fn required_profiles(group: &Group, node: &Node) -> Vec<String> {
    let mut profiles: Vec<String> = Vec::new();
    for profile in group.common_profiles.iter().chain(node.profiles.iter()) {
        if !profiles.contains(profile) {
            profiles.push(profile.clone());
        }
    }
    profiles
}

/// Fail on the first required profile missing from `available`.
pub fn validate_profiles(node: &str, available: &[String], required: &[String]) -> Result<(), ComposeError> {
    match required.iter().find(|p| !available.contains(p)) {
        Some(profile) => Err(ComposeError::MissingProfile {
            node: node.to_string(),
            profile: profile.clone(),
        }),
        None => Ok(()),
    }
}
