//! Wire types shared by the Mini App REST surface and the backend client.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Subscription tariff identifier.
///
/// The set is closed: the service sells exactly these three plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffId {
    Light,
    Standard,
    Premium,
}

impl TariffId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffId::Light => "light",
            TariffId::Standard => "standard",
            TariffId::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<TariffId> {
        match s {
            "light" => Some(TariffId::Light),
            "standard" => Some(TariffId::Standard),
            "premium" => Some(TariffId::Premium),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TariffId::Light => "LIGHT",
            TariffId::Standard => "STANDARD",
            TariffId::Premium => "PREMIUM",
        }
    }
}

impl std::fmt::Display for TariffId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription tariff reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    pub id: TariffId,
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Monthly price in rubles
    #[serde(rename = "monthlyPrice")]
    pub monthly_price: u32,
    pub features: Vec<String>,
}

/// Status of a cleaning visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleaningStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl CleaningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningStatus::Scheduled => "scheduled",
            CleaningStatus::Completed => "completed",
            CleaningStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<CleaningStatus> {
        match s {
            "scheduled" => Some(CleaningStatus::Scheduled),
            "completed" => Some(CleaningStatus::Completed),
            "cancelled" => Some(CleaningStatus::Cancelled),
            _ => None,
        }
    }

    /// Human-readable status for chat messages (Russian UI)
    pub fn display_ru(&self) -> &'static str {
        match self {
            CleaningStatus::Scheduled => "запланирована",
            CleaningStatus::Completed => "выполнена",
            CleaningStatus::Cancelled => "отменена",
        }
    }
}

/// A single cleaning visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningRecord {
    pub id: String,
    /// Local date and time of the visit
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: NaiveDateTime,
    pub status: CleaningStatus,
}

/// Body of POST /api/cleanings/schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Combined local instant (selected date at the selected slot)
    pub date: NaiveDateTime,
    /// The selected slot, e.g. "10:00"
    pub time: String,
    #[serde(rename = "tariffId")]
    pub tariff_id: TariffId,
}

/// Body of POST /api/cleanings/{id}/reschedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDateTime,
    pub time: String,
}

/// Response of the schedule endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub cleaning: CleaningRecord,
    pub success: bool,
}

/// Response of the cancel/reschedule endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
}

/// The authenticated user, as reported by GET /api/user/me
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The three tariffs the service sells, with their marketing feature lists.
///
/// Served by the thin backend as-is; the Mini App and the chat surface both
/// render from this table, never from a hardcoded copy of their own.
pub fn builtin_tariffs() -> Vec<Tariff> {
    vec![
        Tariff {
            id: TariffId::Light,
            display_name: "LIGHT".to_string(),
            monthly_price: 3900,
            features: vec![
                "Уборка пыли со всех доступных поверхностей".to_string(),
                "Мытье полов и плинтусов".to_string(),
                "Уборка ванной комнаты и туалета".to_string(),
                "Мытье кухонных поверхностей".to_string(),
                "Вынос мусора".to_string(),
            ],
        },
        Tariff {
            id: TariffId::Standard,
            display_name: "STANDARD".to_string(),
            monthly_price: 6900,
            features: vec![
                "Всё из тарифа LIGHT".to_string(),
                "Протирка мебели снаружи".to_string(),
                "Смена постельного белья".to_string(),
                "Уборка техники снаружи".to_string(),
                "Первая уборка в подарок".to_string(),
            ],
        },
        Tariff {
            id: TariffId::Premium,
            display_name: "PREMIUM".to_string(),
            monthly_price: 9900,
            features: vec![
                "Всё из тарифа STANDARD".to_string(),
                "Уборка внутри шкафов".to_string(),
                "Мытье окон (1 раз в месяц)".to_string(),
                "Чистка мягкой мебели".to_string(),
                "Первые две уборки в подарок".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tariff_id_roundtrip() {
        for id in [TariffId::Light, TariffId::Standard, TariffId::Premium] {
            assert_eq!(TariffId::parse(id.as_str()), Some(id));
        }
        assert_eq!(TariffId::parse("vip"), None);
    }

    #[test]
    fn test_builtin_tariffs_are_priced_ascending() {
        let tariffs = builtin_tariffs();
        assert_eq!(tariffs.len(), 3);
        assert!(tariffs.windows(2).all(|w| w[0].monthly_price < w[1].monthly_price));
    }

    #[test]
    fn test_schedule_request_wire_format() {
        let req = ScheduleRequest {
            date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            time: "10:00".to_string(),
            tariff_id: TariffId::Standard,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["date"], "2026-09-01T10:00:00");
        assert_eq!(json["tariffId"], "standard");
    }

    #[test]
    fn test_cleaning_status_parse_rejects_unknown() {
        assert_eq!(CleaningStatus::parse("scheduled"), Some(CleaningStatus::Scheduled));
        assert_eq!(CleaningStatus::parse("pending"), None);
    }
}
