//! VM identifiers derived from VM names

use avalanche_types::subnet::vm_name_to_id;
use thiserror::Error;

use crate::core::ids::{Id, ID_LEN};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VmIdError {
    #[error("VM name {name:?} is {len} bytes, longer than 32")]
    TooLong { name: String, len: usize },
    #[error("Cannot derive VM id for {name:?}: {detail}")]
    Invalid { name: String, detail: String },
}

/// The VM name's bytes, zero-padded to 32
pub fn vm_id_from_name(name: &str) -> Result<Id, VmIdError> {
    if name.len() > ID_LEN {
        return Err(VmIdError::TooLong {
            name: name.to_string(),
            len: name.len(),
        });
    }
    vm_name_to_id(name).map_err(|e| VmIdError::Invalid {
        name: name.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vm_id() {
        assert_eq!(
            vm_id_from_name("subnetevm").unwrap().to_string(),
            "srEXiWaHuhNyGwPUi444Tu47ZEDwxTWrbQiuD7FmgSAQ6X7Dy"
        );
    }

    #[test]
    fn test_padding_and_limits() {
        let bytes = vm_id_from_name("vm").unwrap().to_vec();
        assert_eq!(&bytes[..2], b"vm");
        assert!(bytes[2..].iter().all(|b| *b == 0));

        assert!(vm_id_from_name(&"a".repeat(32)).is_ok());
        assert_eq!(
            vm_id_from_name(&"a".repeat(33)),
            Err(VmIdError::TooLong {
                name: "a".repeat(33),
                len: 33
            })
        );
    }
}
