use crate::models::{Coordinates, ListingRecord, SocialLink};
use crate::scrapers::types::{HoursLocale, ParseOptions, SiteProfile};
use serde_json::Value;
use tracing::{debug, warn};

/// Turns search API payloads from the map application into listing records
#[derive(Debug, Clone)]
pub struct ResponseParser {
    profile: SiteProfile,
    options: ParseOptions,
}

impl ResponseParser {
    pub fn new(profile: SiteProfile, options: ParseOptions) -> Self {
        Self { profile, options }
    }

    /// True only for GET calls to the search API
    pub fn is_relevant(&self, url: &str, method: &str) -> bool {
        method.eq_ignore_ascii_case("GET") && url.starts_with(&self.profile.search_api_prefix)
    }

    /// Parse a raw response body; malformed JSON yields nothing
    pub fn parse_body(&self, body: &str) -> Vec<ListingRecord> {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => self.parse(&payload),
            Err(e) => {
                warn!("Failed to decode search payload: {}", e);
                Vec::new()
            }
        }
    }

    /// Extract every usable item from `data.items`
    pub fn parse(&self, payload: &Value) -> Vec<ListingRecord> {
        let Some(items) = payload
            .get("data")
            .and_then(|data| data.get("items"))
            .and_then(Value::as_array)
        else {
            debug!("Payload has no data.items array");
            return Vec::new();
        };

        items.iter().filter_map(|item| self.parse_item(item)).collect()
    }

    fn parse_item(&self, item: &Value) -> Option<ListingRecord> {
        if !item.is_object() {
            return None;
        }

        let name = non_empty_str(item.get("title"))?;
        let address = ["address", "description", "fullAddress"]
            .iter()
            .find_map(|key| non_empty_str(item.get(*key)))?;

        let mut record = ListingRecord {
            name,
            address,
            full_address: non_empty_str(item.get("fullAddress")),
            country: non_empty_str(item.get("country")),
            postal_code: non_empty_str(item.get("postalCode")),
            coordinates: extract_coordinates(item.get("coordinates")),
            ..Default::default()
        };

        if let Some(rating) = item.get("ratingData") {
            record.rating = rating.get("ratingValue").and_then(Value::as_f64);
            record.reviews = rating.get("reviewCount").and_then(Value::as_u64);
            record.rating_count = rating.get("ratingCount").and_then(Value::as_u64);
        }

        if let Some(categories) = item.get("categories").and_then(Value::as_array) {
            record.categories = categories
                .iter()
                .filter_map(|cat| non_empty_str(cat.get("name")).or_else(|| non_empty_str(Some(cat))))
                .collect();
        }

        if let Some(phones) = item.get("phones").and_then(Value::as_array) {
            record.phones = phones
                .iter()
                .filter_map(|phone| {
                    non_empty_str(phone.get("number")).or_else(|| non_empty_str(phone.get("value")))
                })
                .collect();
            record.phone = record.phones.first().cloned();
        }

        record.working_hours = non_empty_str(item.get("workingTimeText")).or_else(|| {
            item.get("workingTime")
                .map(|schedule| format_working_hours(schedule, self.options.hours_locale))
                .filter(|text| !text.is_empty())
        });

        if let Some(links) = item.get("socialLinks").and_then(Value::as_array) {
            record.social_links = links
                .iter()
                .filter_map(|link| {
                    Some(SocialLink {
                        kind: non_empty_str(link.get("type"))?,
                        url: non_empty_str(link.get("href"))?,
                    })
                })
                .collect();
        }

        if let Some(urls) = item.get("urls").and_then(Value::as_array) {
            record.websites = urls.iter().filter_map(|url| non_empty_str(Some(url))).collect();
            record.website = record.websites.first().cloned();
        }

        record.photo = non_empty_str(item.get("photo"))
            .or_else(|| {
                non_empty_str(item.get("photos").and_then(|photos| photos.get("urlTemplate")))
                    .map(|template| template.replace("%s", "L_height"))
            })
            .or_else(|| non_empty_str(item.get("advert").and_then(|advert| advert.get("photo"))));

        if let (Some(seoname), Some(id)) = (non_empty_str(item.get("seoname")), id_string(item.get("id"))) {
            record.org_url = Some(format!(
                "{}/{}/{}",
                self.profile.org_url_base.trim_end_matches('/'),
                seoname,
                id
            ));
        }

        if self.options.keep_raw {
            record.raw_data = Some(item.clone());
        }

        Some(record)
    }
}

/// Coordinates arrive as `[lon, lat]`; swap into named fields
fn extract_coordinates(value: Option<&Value>) -> Option<Coordinates> {
    let pair = value?.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let lon = number(&pair[0])?;
    let lat = number(&pair[1])?;
    Some(Coordinates { lat, lon })
}

/// Render a weekly schedule as `"Mon: 9:00-21:00, Tue: 24 hours"`.
///
/// Each of the first seven slots is either an interval object or an array
/// whose first element is one. Slots without a usable interval are omitted.
pub fn format_working_hours(schedule: &Value, locale: HoursLocale) -> String {
    let Some(days) = schedule.as_array() else {
        return String::new();
    };

    days.iter()
        .zip(locale.day_labels())
        .filter_map(|(slot, day)| {
            let interval = match slot {
                Value::Array(intervals) => intervals.first()?,
                other => other,
            };
            let (from_h, from_m) = clock(interval.get("from")?)?;
            let (to_h, to_m) = clock(interval.get("to")?)?;

            if (from_h, from_m, to_h, to_m) == (0, 0, 0, 0) {
                Some(format!("{}: {}", day, locale.all_day_label()))
            } else {
                Some(format!("{}: {}:{:02}-{}:{:02}", day, from_h, from_m, to_h, to_m))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn clock(value: &Value) -> Option<(u64, u64)> {
    let hours = value.get("hours").and_then(Value::as_u64)?;
    let minutes = value.get("minutes").and_then(Value::as_u64).unwrap_or(0);
    Some((hours, minutes))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
