use serde::{Deserialize, Deserializer};

/// Reads an explicit JSON `null` as the field's default value.
///
/// `#[serde(default)]` only covers absent fields; the backend also sends
/// `null` for unset profile and video attributes.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq, Eq)]
    struct Sample {
        #[serde(default, deserialize_with = "super::null_as_default")]
        name: String,
        #[serde(default, deserialize_with = "super::null_as_default")]
        count: u64,
    }

    #[test]
    fn null_and_missing_fall_back_to_default() {
        let sample: Sample = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: String::new(),
                count: 0
            }
        );

        let sample: Sample = serde_json::from_str(r#"{"name": "a", "count": 3}"#).unwrap();
        assert_eq!(sample.name, "a");
        assert_eq!(sample.count, 3);
    }

    #[test]
    fn wrong_type_is_still_an_error() {
        assert!(serde_json::from_str::<Sample>(r#"{"count": "many"}"#).is_err());
    }
}
