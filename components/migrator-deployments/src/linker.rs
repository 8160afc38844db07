use alloy_primitives::keccak256;

use crate::artifacts::Artifact;
use crate::types::{address_hex, Address};

const PLACEHOLDER_LEN: usize = 40;

/// `__<name>___...`, padded to the width of a hex encoded address.
pub fn legacy_placeholder(name: &str) -> String {
    let label: String = name.chars().take(PLACEHOLDER_LEN - 4).collect();
    format!("__{:_<38}", label)
}

/// `__$<34 hex chars of keccak256(fully qualified name)>$__`, emitted by solc >= 0.5.
pub fn hashed_placeholder(fully_qualified_name: &str) -> String {
    let hash = hex::encode(keccak256(fully_qualified_name.as_bytes()).as_slice());
    format!("__${}$__", &hash[..34])
}

/// Every placeholder form the compiler may have used for `library`.
pub fn library_placeholders(library: &Artifact) -> Vec<String> {
    let mut placeholders = vec![legacy_placeholder(library.name.as_str())];
    if library.source_unit.is_some() {
        let fully_qualified_name = library.fully_qualified_name();
        placeholders.push(legacy_placeholder(&fully_qualified_name));
        placeholders.push(hashed_placeholder(&fully_qualified_name));
    }
    placeholders.dedup();
    placeholders
}

/// Replaces every occurrence of the placeholders with `address`, returning the linked
/// bytecode and the number of substitutions.
pub fn link_bytecode(bytecode: &str, placeholders: &[String], address: &Address) -> (String, usize) {
    let address = address_hex(address);
    let mut linked = bytecode.to_string();
    let mut substitutions = 0;
    for placeholder in placeholders.iter() {
        let occurrences = linked.matches(placeholder.as_str()).count();
        if occurrences > 0 {
            linked = linked.replace(placeholder.as_str(), &address);
            substitutions += occurrences;
        }
    }
    (linked, substitutions)
}

/// Placeholders still present in `bytecode`, in order of first appearance.
pub fn unresolved_placeholders(bytecode: &str) -> Vec<String> {
    let bytes = bytecode.as_bytes();
    let mut found: Vec<String> = vec![];
    let mut cursor = 0;
    while cursor + PLACEHOLDER_LEN <= bytes.len() {
        let window = &bytes[cursor..cursor + PLACEHOLDER_LEN];
        if window.starts_with(b"__") && window.ends_with(b"__") {
            let placeholder = String::from_utf8_lossy(window).to_string();
            if !found.contains(&placeholder) {
                found.push(placeholder);
            }
            cursor += PLACEHOLDER_LEN;
        } else {
            cursor += 1;
        }
    }
    found
}

/// Human readable label: the library name for legacy placeholders, the raw hash otherwise.
pub fn describe_placeholder(placeholder: &str) -> String {
    if placeholder.starts_with("__$") {
        placeholder.to_string()
    } else {
        placeholder.trim_matches('_').to_string()
    }
}

pub fn decode_bytecode(bytecode: &str) -> Result<Vec<u8>, String> {
    hex::decode(bytecode.trim_start_matches("0x")).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactName;
    use std::str::FromStr;

    fn string_utils() -> Artifact {
        Artifact::new(
            ArtifactName::from_str("StringUtils").unwrap(),
            Default::default(),
            "0x6056",
        )
    }

    #[test]
    fn test_placeholder_shapes() {
        let legacy = legacy_placeholder("StringUtils");
        assert_eq!(legacy, "__StringUtils___________________________");
        assert_eq!(legacy.len(), 40);

        let long = legacy_placeholder("project:/contracts/libraries/StringUtils.sol:StringUtils");
        assert_eq!(long.len(), 40);
        assert!(long.ends_with("__"));

        let hashed = hashed_placeholder("project:/contracts/StringUtils.sol:StringUtils");
        assert_eq!(hashed.len(), 40);
        assert!(hashed.starts_with("__$") && hashed.ends_with("$__"));
    }

    #[test]
    fn test_link_both_placeholder_forms() {
        let library = string_utils();
        let placeholders = library_placeholders(&library);
        let hashed = hashed_placeholder(&library.fully_qualified_name());
        let bytecode = format!("6080{}60{}00", legacy_placeholder("StringUtils"), hashed);
        assert_eq!(unresolved_placeholders(&bytecode).len(), 2);

        let address = Address::from_str("0x1111111111111111111111111111111111111111").unwrap();
        let (linked, substitutions) = link_bytecode(&bytecode, &placeholders, &address);
        assert_eq!(substitutions, 2);
        assert_eq!(
            linked,
            format!("6080{}60{}00", address_hex(&address), address_hex(&address))
        );
        assert!(unresolved_placeholders(&linked).is_empty());
        assert!(decode_bytecode(&linked).is_ok());
    }

    #[test]
    fn test_unrelated_placeholders_are_left_alone() {
        let other = legacy_placeholder("DateUtils");
        let bytecode = format!("60{}60", other);
        let address = Address::from_str("0x1111111111111111111111111111111111111111").unwrap();
        let (linked, substitutions) =
            link_bytecode(&bytecode, &library_placeholders(&string_utils()), &address);
        assert_eq!(substitutions, 0);
        assert_eq!(unresolved_placeholders(&linked), vec![other.clone()]);
        assert_eq!(describe_placeholder(&other), "DateUtils");
    }
}
