use chrono::Utc;
use clap::Args;
use listing_moderation::config::AppConfig;
use listing_moderation::error::AppError;
use listing_moderation::moderation::detectors::{AssetImage, DetectorSuite, Frame};
use listing_moderation::moderation::{
    AssetId, CategoryPolicy, FusionEngine, InMemoryListingRepository, InMemoryMediaStore, Listing,
    ListingId, ListingModerationService, ListingServiceError, ListingStatus, MediaAsset,
    MediaStore, ModerationSettings, ModerationVerdict, PolicyTable, RecordingNotificationSink,
    SellerId,
};
use listing_moderation::telemetry;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct InspectArgs {
    /// Image files to analyse, in listing order
    #[arg(required = true, num_args = 1..)]
    pub(crate) images: Vec<PathBuf>,
    /// Listing title used by the category rules
    #[arg(long, default_value = "inspection")]
    pub(crate) title: String,
    /// Listing description used by the category rules
    #[arg(long, default_value = "")]
    pub(crate) description: String,
    /// Asking price
    #[arg(long, default_value = "0")]
    pub(crate) price: Decimal,
    /// Category name; unknown or missing names fall back to the catch-all policy
    #[arg(long)]
    pub(crate) category: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PoliciesArgs {
    /// Only print the policy this category resolves to
    #[arg(long)]
    pub(crate) category: Option<String>,
}

pub(crate) fn run_inspect(args: InspectArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let settings = config.moderation.settings()?;

    let (listing, assets, store) = load_inspection(&args);
    let breakdown = score_images(&settings, &store, &assets)?;
    let service = ListingModerationService::new(
        Arc::new(InMemoryListingRepository::default()),
        Arc::clone(&store),
        Arc::new(RecordingNotificationSink::default()),
        &settings,
        config.moderation.service_options(),
    )?;
    let verdict = service.orchestrator().review(&listing, &assets);

    render_inspection(&listing, &breakdown, &verdict);
    Ok(())
}

pub(crate) fn run_policies(args: PoliciesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let settings = config.moderation.settings()?;
    let table =
        PolicyTable::from_definition(&settings.policies).map_err(ListingServiceError::from)?;

    match args.category.as_deref() {
        Some(name) => {
            let policy = table.resolve(Some(name));
            println!("'{name}' resolves to {}", policy.name);
            render_policy(policy);
        }
        None => {
            println!("Global forbidden terms: {}", table.global_forbidden().join(", "));
            for policy in table.policies() {
                render_policy(policy);
            }
        }
    }
    Ok(())
}

fn load_inspection(args: &InspectArgs) -> (Listing, Vec<MediaAsset>, Arc<InMemoryMediaStore>) {
    let listing = Listing {
        id: ListingId("lst-inspect".to_string()),
        title: args.title.clone(),
        description: args.description.clone(),
        price: args.price,
        category: args.category.clone(),
        seller: SellerId("operator".to_string()),
        status: ListingStatus::UnderReview,
        review_due_at: None,
        manually_suspended: false,
        created_at: Utc::now(),
    };

    let store = Arc::new(InMemoryMediaStore::default());
    let assets = args
        .images
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let reference = path.display().to_string();
            match image::open(path) {
                Ok(decoded) => store.insert(reference.clone(), decoded.to_rgb8()),
                Err(err) => {
                    eprintln!("warning: could not decode {reference}: {err}");
                    store.insert_corrupt(reference.clone());
                }
            }
            MediaAsset {
                id: AssetId(format!("ast-inspect-{index}")),
                listing_id: listing.id.clone(),
                reference,
                is_primary: index == 0,
            }
        })
        .collect();

    (listing, assets, store)
}

struct ImageBreakdown {
    reference: String,
    scores: Option<Vec<(String, f32)>>,
    confidence: f32,
    explanation: String,
}

fn score_images(
    settings: &ModerationSettings,
    store: &InMemoryMediaStore,
    assets: &[MediaAsset],
) -> Result<Vec<ImageBreakdown>, AppError> {
    let suite = DetectorSuite::standard(
        &settings.detectors,
        Arc::new(settings.detectors.filename_terms.clone()),
    );
    let fusion = FusionEngine::new(settings.fusion.clone()).map_err(ListingServiceError::from)?;

    let breakdown = assets
        .iter()
        .map(|asset| {
            let frame = store
                .read_asset(&asset.reference)
                .ok()
                .and_then(|image| Frame::from_rgb(&image, settings.max_analysis_side).ok());
            let Some(frame) = frame else {
                return ImageBreakdown {
                    reference: asset.reference.clone(),
                    scores: None,
                    confidence: 0.0,
                    explanation: "not analysable".to_string(),
                };
            };
            let scores = suite.score_all(&AssetImage {
                filename: asset.filename(),
                frame: &frame,
            });
            let outcome = fusion.fuse(&scores);
            ImageBreakdown {
                reference: asset.reference.clone(),
                scores: Some(scores.into_iter().collect()),
                confidence: outcome.confidence,
                explanation: outcome.explanation,
            }
        })
        .collect();
    Ok(breakdown)
}

fn render_inspection(listing: &Listing, breakdown: &[ImageBreakdown], verdict: &ModerationVerdict) {
    println!(
        "Inspection of '{}' ({} at {})",
        listing.title,
        listing.category.as_deref().unwrap_or("no category"),
        listing.price
    );
    for image in breakdown {
        println!("\n{}", image.reference);
        match &image.scores {
            Some(scores) => {
                for (detector, score) in scores {
                    println!("  {detector:<16} {score:.3}");
                }
                println!("  fused confidence {:.3}: {}", image.confidence, image.explanation);
            }
            None => println!("  {}", image.explanation),
        }
    }

    let decision = if verdict.approved {
        "APPROVED"
    } else {
        "REJECTED"
    };
    println!(
        "\nVerdict: {decision} at stage {:?} (confidence {:.2})",
        verdict.stage, verdict.confidence
    );
    println!("Reason: {}", verdict.reason);
}

fn render_policy(policy: &CategoryPolicy) {
    println!("\n{}", policy.name);
    println!("  max price: {}", policy.max_price);
    println!(
        "  min description length: {}",
        policy.min_description_length
    );
    if !policy.required_keywords.is_empty() {
        println!("  requires one of: {}", policy.required_keywords.join(", "));
    }
    if !policy.forbidden_keywords.is_empty() {
        println!("  forbidden: {}", policy.forbidden_keywords.join(", "));
    }
    for pattern in &policy.suspicious_patterns {
        println!("  suspicious: {}", pattern.as_str());
    }
}
