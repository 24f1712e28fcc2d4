use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Field names follow the RESO data dictionary as returned by the MLS feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Listing {
    pub listing_key: Option<String>,
    pub listing_id: Option<String>,
    pub unparsed_address: Option<String>,
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    pub unit_number: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub list_price: Option<f64>,
    pub close_price: Option<f64>,
    pub bedrooms_total: Option<i32>,
    pub bathrooms_total_integer: Option<i32>,
    pub living_area: Option<f64>,
    pub standard_status: Option<String>,
    pub mls_status: Option<String>,
    pub property_type: Option<String>,
    pub modification_timestamp: Option<DateTime<Utc>>,
    pub close_date: Option<String>,
}

pub const LISTING_FIELDS: &[&str] = &[
    "ListingKey",
    "ListingId",
    "UnparsedAddress",
    "StreetNumber",
    "StreetName",
    "UnitNumber",
    "City",
    "PostalCode",
    "ListPrice",
    "ClosePrice",
    "BedroomsTotal",
    "BathroomsTotalInteger",
    "LivingArea",
    "StandardStatus",
    "MlsStatus",
    "PropertyType",
    "ModificationTimestamp",
    "CloseDate",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListingCategory {
    New,
    Leased,
    Sold,
}

impl ListingCategory {
    pub fn priority(&self) -> u8 {
        match self {
            ListingCategory::New => 0,
            ListingCategory::Leased => 1,
            ListingCategory::Sold => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingCategory::New => "new",
            ListingCategory::Leased => "leased",
            ListingCategory::Sold => "sold",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            ListingCategory::New => "New listings",
            ListingCategory::Leased => "Recently leased",
            ListingCategory::Sold => "Recently sold",
        }
    }
}

impl Listing {
    pub fn key(&self) -> Option<&str> {
        self.listing_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn address_line(&self) -> Option<String> {
        if let Some(addr) = self.unparsed_address.as_deref().filter(|a| !a.trim().is_empty()) {
            return Some(addr.trim().to_string());
        }
        let name = self.street_name.as_deref().filter(|n| !n.trim().is_empty())?;
        let mut line = match self.street_number.as_deref() {
            Some(num) if !num.trim().is_empty() => format!("{} {}", num.trim(), name.trim()),
            _ => name.trim().to_string(),
        };
        if let Some(unit) = self.unit_number.as_deref().filter(|u| !u.trim().is_empty()) {
            line.push_str(&format!(" #{}", unit.trim()));
        }
        Some(line)
    }

    pub fn price(&self) -> Option<f64> {
        self.close_price.or(self.list_price).filter(|p| *p > 0.0)
    }

    pub fn has_required_fields(&self) -> bool {
        self.key().is_some() && self.address_line().is_some() && self.price().is_some()
    }

    pub fn is_lease(&self) -> bool {
        self.property_type
            .as_deref()
            .map(|t| t.to_lowercase().contains("lease"))
            .unwrap_or(false)
    }

    fn has_status(&self, wanted: &[&str]) -> bool {
        [self.standard_status.as_deref(), self.mls_status.as_deref()]
            .into_iter()
            .flatten()
            .any(|s| wanted.iter().any(|w| s.eq_ignore_ascii_case(w)))
    }

    pub fn category(&self, from_sold_feed: bool) -> ListingCategory {
        let closed = self.has_status(&["Closed", "Sold", "Leased"]);
        if self.has_status(&["Leased"]) || (self.is_lease() && (closed || from_sold_feed)) {
            ListingCategory::Leased
        } else if from_sold_feed || closed {
            ListingCategory::Sold
        } else {
            ListingCategory::New
        }
    }

    pub fn summary(&self) -> ListingSummary {
        let price = self.price();
        ListingSummary {
            listing_key: self.listing_key.clone().unwrap_or_default(),
            address: self.address_line().unwrap_or_default(),
            unit: self.unit_number.clone(),
            city: self.city.clone(),
            price,
            price_display: price.map(format_price),
            beds: self.bedrooms_total,
            baths: self.bathrooms_total_integer,
            living_area: self.living_area,
            status: self
                .mls_status
                .clone()
                .or_else(|| self.standard_status.clone()),
            property_type: self.property_type.clone(),
            modified_at: self.modification_timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingSummary {
    pub listing_key: String,
    pub address: String,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub price_display: Option<String>,
    pub beds: Option<i32>,
    pub baths: Option<i32>,
    pub living_area: Option<f64>,
    pub status: Option<String>,
    pub property_type: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Media {
    #[serde(rename = "MediaKey")]
    pub media_key: Option<String>,
    #[serde(rename = "ResourceRecordKey")]
    pub resource_record_key: Option<String>,
    #[serde(rename = "MediaURL")]
    pub media_url: Option<String>,
    #[serde(rename = "Order")]
    pub order: Option<i32>,
    #[serde(rename = "MediaCategory")]
    pub media_category: Option<String>,
    #[serde(rename = "ShortDescription")]
    pub short_description: Option<String>,
}

pub const MEDIA_FIELDS: &[&str] = &[
    "MediaKey",
    "ResourceRecordKey",
    "MediaURL",
    "Order",
    "MediaCategory",
    "ShortDescription",
];

pub fn format_price(price: f64) -> String {
    let whole = price.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if whole < 0 {
        format!("-${out}")
    } else {
        format!("${out}")
    }
}
