/// Enums stored as TEXT columns and sent as snake_case JSON strings.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(anyhow::anyhow!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    )),
                }
            }
        }
    };
}

pub mod escalation;
pub mod fleet;
pub mod issue;
pub mod metric;
pub mod route;
pub mod shipment;
pub mod user;

#[cfg(test)]
mod tests {
    use super::shipment::ShipmentStatus;
    use super::user::Role;

    #[test]
    fn test_text_enum_round_trips_storage_value() {
        for status in ShipmentStatus::ALL {
            let parsed: ShipmentStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert_eq!(ShipmentStatus::OutForDelivery.to_string(), "out_for_delivery");
    }

    #[test]
    fn test_text_enum_rejects_unknown_value() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Role"));
    }

    #[test]
    fn test_text_enum_matches_serde_name() {
        let json = serde_json::to_string(&ShipmentStatus::PickedUp).unwrap();
        assert_eq!(json, "\"picked_up\"");
    }
}
