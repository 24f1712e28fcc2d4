use chrono::{DateTime, Utc};
use maud::{html, Markup, DOCTYPE};

use super::dedup::{BuildingSection, DigestEntry, ListingSet};
use crate::models::listing::format_price;
use crate::models::{ListingCategory, User};

const CATEGORY_ORDER: [ListingCategory; 3] = [
    ListingCategory::Sold,
    ListingCategory::Leased,
    ListingCategory::New,
];

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn subject_line(count: usize, buildings: usize) -> String {
    let updates = if count == 1 { "update" } else { "updates" };
    let places = if buildings == 1 {
        "your saved building".to_string()
    } else {
        format!("{buildings} saved buildings")
    };
    format!("{count} {updates} in {places}")
}

pub fn render_digest(user: &User, listings: &ListingSet, site_url: &str, now: DateTime<Utc>) -> RenderedEmail {
    let sections = listings.by_building();
    let site_url = site_url.trim_end_matches('/');
    let manage_url = format!("{site_url}/account/saved-searches");

    let markup = html! {
        (DOCTYPE)
        html {
            body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;" {
                div style="max-width: 600px; margin: 0 auto; padding: 20px;" {
                    h2 { "Hi " (user.greeting_name()) "," }
                    p {
                        "Here's what changed since your last update in the buildings you follow ("
                        (now.format("%B %-d, %Y").to_string())
                        ")."
                    }
                    @for section in &sections {
                        (building_block(section, site_url))
                    }
                    hr style="margin-top: 30px; border: none; border-top: 1px solid #eee;";
                    p style="font-size: 0.8em; color: #999;" {
                        "You're receiving this because you saved these buildings. "
                        a href=(manage_url) style="color: #007bff;" { "Manage your saved buildings" }
                    }
                }
            }
        }
    };

    RenderedEmail {
        subject: subject_line(listings.len(), sections.len()),
        html: markup.into_string(),
    }
}

fn building_block(section: &BuildingSection<'_>, site_url: &str) -> Markup {
    html! {
        h3 style="margin-top: 28px; border-bottom: 2px solid #007bff;" { (section.building) }
        @for category in CATEGORY_ORDER {
            @let entries = section.in_category(category);
            @if !entries.is_empty() {
                h4 style="margin-bottom: 4px;" { (category.heading()) " (" (entries.len()) ")" }
                ul style="padding-left: 18px;" {
                    @for entry in entries {
                        (listing_item(entry, site_url))
                    }
                }
            }
        }
    }
}

fn listing_item(entry: &DigestEntry, site_url: &str) -> Markup {
    let listing = &entry.listing;
    let key = listing.key().unwrap_or_default();
    let url = format!("{site_url}/listing/{key}");
    let address = listing.address_line().unwrap_or_default();

    html! {
        li style="margin-bottom: 6px;" {
            a href=(url) style="color: #007bff;" { (address) }
            @if let Some(price) = listing.price() {
                " · " strong { (format_price(price)) }
            }
            @if let Some(beds) = listing.bedrooms_total {
                " · " (beds) " bd"
            }
            @if let Some(baths) = listing.bathrooms_total_integer {
                " · " (baths) " ba"
            }
        }
    }
}
