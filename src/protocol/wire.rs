//! Layout helpers shared by the encoder and decoder

use super::{ABSENT_LENGTH, Error, ExternalUuid, FieldDescriptor, FieldType, Result};

/// Largest fixed-width item: presence byte followed by an external UUID
pub(crate) const SCRATCH_LEN: usize = 1 + ExternalUuid::SIZE;

/// Width of a length or count prefix
pub(crate) const PREFIX_LEN: usize = 4;

/// Width of a present UUID including its presence byte
pub(crate) const UUID_LEN: usize = 17;

/// Width of a present external UUID including its presence byte
pub(crate) const EXTERNAL_UUID_LEN: usize = SCRATCH_LEN;

/// Length prefix for an optional variable-length value
pub(crate) fn length_prefix(field: &'static str, len: Option<usize>, max: usize) -> Result<i32> {
    let Some(len) = len else {
        return Ok(ABSENT_LENGTH);
    };
    if len > max {
        return Err(Error::FieldTooLarge { field, len, max });
    }
    i32::try_from(len).map_err(|_| Error::FieldTooLarge {
        field,
        len,
        max: i32::MAX as usize,
    })
}

/// Interpret a length prefix read from the wire; `None` means absent
pub(crate) fn decode_length(field: &'static str, raw: i32, max: usize) -> Result<Option<usize>> {
    if raw == ABSENT_LENGTH {
        return Ok(None);
    }
    let len = usize::try_from(raw).map_err(|_| Error::InvalidLength { field, len: raw })?;
    if len > max {
        return Err(Error::FieldTooLarge { field, len, max });
    }
    Ok(Some(len))
}

/// Number of flattened items behind a collection count; maps hold two per entry
pub(crate) fn flattened_len(
    field: &'static str,
    is_map: bool,
    count: usize,
    max: usize,
) -> Result<usize> {
    if !is_map {
        return Ok(count);
    }
    count
        .checked_mul(2)
        .ok_or(Error::FieldTooLarge { field, len: count, max })
}

/// Type of the element at a flattened index; map entries alternate key, value
pub(crate) fn element_type(desc: &FieldDescriptor, index: usize) -> Result<FieldType> {
    let ty = match desc.field_type() {
        FieldType::Map if index % 2 == 0 => desc.key_type(),
        _ => desc.item_type(),
    };
    ty.ok_or(Error::InvalidValue {
        field: desc.name(),
        reason: "collection field without element type",
    })
}

pub(crate) fn check_type(field: &'static str, expected: FieldType, found: FieldType) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::FieldTypeMismatch {
            field,
            expected,
            found,
        })
    }
}

pub(crate) fn array<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix_limits() {
        assert_eq!(length_prefix("f", None, 4).unwrap(), -1);
        assert_eq!(length_prefix("f", Some(4), 4).unwrap(), 4);
        assert!(matches!(
            length_prefix("f", Some(5), 4),
            Err(Error::FieldTooLarge { len: 5, max: 4, .. })
        ));
    }

    #[test]
    fn test_decode_length() {
        assert_eq!(decode_length("f", -1, 8).unwrap(), None);
        assert_eq!(decode_length("f", 0, 8).unwrap(), Some(0));
        assert!(matches!(
            decode_length("f", -2, 8),
            Err(Error::InvalidLength { len: -2, .. })
        ));
        assert!(matches!(
            decode_length("f", 9, 8),
            Err(Error::FieldTooLarge { .. })
        ));
    }

    #[test]
    fn test_flattened_len() {
        assert_eq!(flattened_len("m", false, 7, 8).unwrap(), 7);
        assert_eq!(flattened_len("m", true, 7, 8).unwrap(), 14);
        assert!(matches!(
            flattened_len("m", true, usize::MAX, usize::MAX),
            Err(Error::FieldTooLarge { field: "m", len: usize::MAX, .. })
        ));
    }

    #[test]
    fn test_map_element_types_alternate() {
        let desc = FieldDescriptor::map("m", FieldType::Uuid, FieldType::ExternalUuid);
        assert_eq!(element_type(&desc, 0).unwrap(), FieldType::Uuid);
        assert_eq!(element_type(&desc, 1).unwrap(), FieldType::ExternalUuid);
        assert_eq!(element_type(&desc, 4).unwrap(), FieldType::Uuid);

        let desc = FieldDescriptor::array("a", FieldType::Int);
        assert_eq!(element_type(&desc, 3).unwrap(), FieldType::Int);
    }
}
