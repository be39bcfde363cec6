use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for marketplace listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

/// Identifier wrapper for media assets attached to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

/// Identifier of the seller who owns a listing; also the notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellerId(pub String);

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SellerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a listing as seen by the moderation pipeline.
///
/// `UnderReview` is the claim state held while a single reviewer runs; it is never
/// observable as a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    UnderReview,
    Available,
    Unavailable,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Product-for-sale record moderated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: Option<String>,
    pub seller: SellerId,
    pub status: ListingStatus,
    pub review_due_at: Option<DateTime<Utc>>,
    pub manually_suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Title and description joined and lower-cased for substring/regex matching.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }

    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }
}

/// One image attached to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub listing_id: ListingId,
    pub reference: String,
    pub is_primary: bool,
}

impl MediaAsset {
    /// Final path segment of the stored reference, used for filename screening.
    pub fn filename(&self) -> &str {
        self.reference
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.reference.as_str())
    }

    /// Lower-cased filename without its extension.
    pub fn filename_stem(&self) -> String {
        let name = self.filename();
        let stem = match name.rfind('.') {
            Some(index) if index > 0 => &name[..index],
            _ => name,
        };
        stem.to_lowercase()
    }
}

/// Seller-provided submission handed over by the listing-creation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSubmission {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    pub seller: SellerId,
    #[serde(default)]
    pub assets: Vec<AssetSubmission>,
}

/// Media reference supplied alongside a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSubmission {
    pub reference: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Sanitized representation of a listing's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ListingStatusView {
    pub listing_id: ListingId,
    pub title: String,
    pub status: &'static str,
    pub manually_suspended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_due_at: Option<DateTime<Utc>>,
}

impl From<&Listing> for ListingStatusView {
    fn from(listing: &Listing) -> Self {
        Self {
            listing_id: listing.id.clone(),
            title: listing.title.clone(),
            status: listing.status.label(),
            manually_suspended: listing.manually_suspended,
            review_due_at: listing.review_due_at,
        }
    }
}
