use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::listing::{LISTING_FIELDS, MEDIA_FIELDS};
use crate::models::{Listing, ListingSummary, Media};
use crate::services::address::ParsedAddress;
use crate::services::mls::{MlsClient, MlsError, MlsResource};
use crate::services::odata::{expr, Direction, ODataQuery};

pub const MAX_PAGE_SIZE: u32 = 200;
const MAX_MEDIA: u32 = 50;
// Pages followed per digest query before giving up on a very busy building.
const MAX_DIGEST_PAGES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub listings: Vec<ListingSummary>,
    pub total: Option<u64>,
    pub top: u32,
    pub skip: u32,
}

pub fn address_filter(address: &ParsedAddress) -> String {
    expr::and_all(vec![
        expr::eq("StreetNumber", address.number.as_str()),
        expr::contains("StreetName", &address.name),
    ])
}

// Closed deals live in the sold feed; everything else is on Property.
pub fn resource_for_status(status: &str) -> MlsResource {
    if ["closed", "sold", "leased"]
        .iter()
        .any(|s| status.eq_ignore_ascii_case(s))
    {
        MlsResource::PropertySold
    } else {
        MlsResource::Property
    }
}

fn listing_query() -> ODataQuery {
    ODataQuery::new()
        .select(LISTING_FIELDS.iter().copied())
        .order_by("ModificationTimestamp", Direction::Desc)
}

pub async fn by_address(
    mls: &MlsClient,
    address: &ParsedAddress,
    top: u32,
) -> Result<Vec<Listing>, MlsError> {
    let query = listing_query()
        .filter(address_filter(address))
        .top(top.clamp(1, MAX_PAGE_SIZE));

    let page = mls.fetch_page(MlsResource::Property, &query).await?;
    Ok(page.value)
}

pub async fn modified_since(
    mls: &MlsClient,
    resource: MlsResource,
    address: &ParsedAddress,
    since: DateTime<Utc>,
) -> Result<Vec<Listing>, MlsError> {
    let query = listing_query()
        .filter(address_filter(address))
        .filter(expr::ge("ModificationTimestamp", since))
        .top(MAX_PAGE_SIZE);

    mls.fetch_all(resource, &query, MAX_DIGEST_PAGES).await
}

pub async fn by_key(mls: &MlsClient, key: &str) -> Result<Option<Listing>, MlsError> {
    let query = ODataQuery::new()
        .filter(expr::eq("ListingKey", key))
        .select(LISTING_FIELDS.iter().copied())
        .top(1);

    for resource in [MlsResource::Property, MlsResource::PropertySold] {
        let page = mls.fetch_page::<Listing>(resource, &query).await?;
        if let Some(listing) = page.value.into_iter().next() {
            return Ok(Some(listing));
        }
    }
    Ok(None)
}

pub async fn by_status(
    mls: &MlsClient,
    status: &str,
    top: u32,
    skip: u32,
) -> Result<ListingPage, MlsError> {
    let top = top.clamp(1, MAX_PAGE_SIZE);
    let query = listing_query()
        .filter(expr::eq("MlsStatus", status))
        .top(top)
        .skip(skip)
        .count(true);

    let page = mls
        .fetch_page::<Listing>(resource_for_status(status), &query)
        .await?;

    Ok(ListingPage {
        listings: page.value.iter().map(Listing::summary).collect(),
        total: page.count,
        top,
        skip,
    })
}

pub async fn media_for(mls: &MlsClient, key: &str) -> Result<Vec<Media>, MlsError> {
    let query = ODataQuery::new()
        .filter(expr::eq("ResourceRecordKey", key))
        .select(MEDIA_FIELDS.iter().copied())
        .order_by("Order", Direction::Asc)
        .top(MAX_MEDIA);

    let page = mls.fetch_page(MlsResource::Media, &query).await?;
    Ok(page.value)
}
