//! Multimarket Commerce - pricing admin service

use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use multimarket_commerce::domain::aggregates::{AddOns, MarketTierPrice, PricingSettings, Quote, QuoteTotals, VariantBasePrice, VariantPricing};
use multimarket_commerce::domain::value_objects::{Market, Tier};
use multimarket_commerce::{base_tiers_from_rows, matrix_from_rows, BaseTierRow, MarketTierRow, SettingsRow};

#[derive(Clone)] pub struct AppState { pub db: sqlx::PgPool }

type HandlerError = (StatusCode, String);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let db = PgPoolOptions::new().max_connections(10).connect(&std::env::var("DATABASE_URL")?).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let state = AppState { db };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "multimarket-commerce"})) }))
        .route("/api/v1/pricing/settings", get(get_settings).put(put_settings))
        .route("/api/v1/variants/:id/tiers", get(get_base_tiers).put(put_base_tiers))
        .route("/api/v1/variants/:id/markets", get(get_market_prices).put(put_market_prices))
        .route("/api/v1/quotes", post(create_quote))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("Multimarket pricing service listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

fn internal<E: std::fmt::Display>(e: E) -> HandlerError { (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()) }

// =============================================================================
// Settings
// =============================================================================

/// Missing settings are not an error; the hard-coded defaults apply until the
/// first save.
async fn load_settings(db: &sqlx::PgPool) -> Result<PricingSettings, HandlerError> {
    let row = sqlx::query_as::<_, SettingsRow>("SELECT * FROM pricing_settings WHERE id = 1").fetch_optional(db).await.map_err(internal)?;
    row.map(PricingSettings::try_from).transpose().map_err(internal).map(|s| s.unwrap_or_default())
}

async fn get_settings(State(s): State<AppState>) -> Result<Json<PricingSettings>, HandlerError> {
    Ok(Json(load_settings(&s.db).await?))
}

async fn put_settings(State(s): State<AppState>, Json(r): Json<PricingSettings>) -> Result<Json<PricingSettings>, HandlerError> {
    let markets = serde_json::to_value(&r.markets).map_err(internal)?;
    sqlx::query("INSERT INTO pricing_settings (id, markets, labeling_pct, packaging_pct, barcode_fee, photos_fee, min_order, updated_at) VALUES (1, $1, $2, $3, $4, $5, $6, NOW()) ON CONFLICT (id) DO UPDATE SET markets = $1, labeling_pct = $2, packaging_pct = $3, barcode_fee = $4, photos_fee = $5, min_order = $6, updated_at = NOW()")
        .bind(&markets).bind(r.labeling_pct).bind(r.packaging_pct).bind(r.barcode_fee).bind(r.photos_fee).bind(r.min_order)
        .execute(&s.db).await.map_err(internal)?;
    tracing::info!("pricing settings saved");
    Ok(Json(r))
}

// =============================================================================
// Variant Pricing
// =============================================================================

#[derive(Debug, Serialize)]
pub struct VariantPricingResponse { pub variant_id: Uuid, pub base_tiers: Vec<VariantBasePrice>, pub market_prices: Vec<MarketTierPrice> }

impl VariantPricingResponse {
    fn from_pricing(pricing: &VariantPricing) -> Self {
        Self {
            variant_id: pricing.variant_id(),
            base_tiers: pricing.base_tiers().to_vec(),
            market_prices: pricing.markets().cells().to_vec(),
        }
    }
}

async fn load_variant_pricing(db: &sqlx::PgPool, variant_id: Uuid, settings: &PricingSettings) -> Result<VariantPricing, HandlerError> {
    let tier_rows = sqlx::query_as::<_, BaseTierRow>("SELECT * FROM variant_base_tiers WHERE variant_id = $1 ORDER BY min_qty").bind(variant_id).fetch_all(db).await.map_err(internal)?;
    let market_rows = sqlx::query_as::<_, MarketTierRow>("SELECT * FROM variant_market_prices WHERE variant_id = $1").bind(variant_id).fetch_all(db).await.map_err(internal)?;
    let base_tiers = base_tiers_from_rows(tier_rows).map_err(internal)?;
    let matrix = matrix_from_rows(market_rows).map_err(internal)?;
    Ok(VariantPricing::initialize(variant_id, None, base_tiers, matrix, settings))
}

async fn store_market_cells(db: &sqlx::PgPool, pricing: &VariantPricing) -> Result<(), HandlerError> {
    for cell in pricing.markets().cells() {
        sqlx::query("INSERT INTO variant_market_prices (id, variant_id, market, tier, percent, price, currency, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) ON CONFLICT (variant_id, market, tier) DO UPDATE SET percent = $5, price = $6, currency = $7, updated_at = NOW()")
            .bind(Uuid::now_v7()).bind(pricing.variant_id()).bind(cell.market.code()).bind(cell.tier.code()).bind(cell.percent).bind(cell.price).bind(cell.market.currency())
            .execute(db).await.map_err(internal)?;
    }
    Ok(())
}

async fn get_base_tiers(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<BaseTierRow>>, HandlerError> {
    let rows = sqlx::query_as::<_, BaseTierRow>("SELECT * FROM variant_base_tiers WHERE variant_id = $1 ORDER BY min_qty").bind(id).fetch_all(&s.db).await.map_err(internal)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceTiersRequest { #[validate] pub tiers: Vec<TierWrite> }

#[derive(Debug, Deserialize, Validate)]
pub struct TierWrite {
    pub tier: Tier,
    #[validate(range(min = 1))]
    pub min_qty: u32,
    #[serde(default)]
    pub unit_price: Decimal,
}

/// Replaces a variant's supplier bands via per-tier upsert, then re-derives
/// market prices from the existing percents. Base rows are written before the
/// market grid is recomputed, so reconciliation always reads the new base.
async fn put_base_tiers(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ReplaceTiersRequest>) -> Result<Json<VariantPricingResponse>, HandlerError> {
    r.validate().map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let mut sorted = r.tiers.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|t| t.tier);
    if sorted.windows(2).any(|w| w[0].min_qty >= w[1].min_qty) {
        return Err((StatusCode::BAD_REQUEST, "min_qty must be strictly increasing across tiers".to_string()));
    }

    let settings = load_settings(&s.db).await?;
    let mut pricing = load_variant_pricing(&s.db, id, &settings).await?;

    for t in &r.tiers {
        sqlx::query("INSERT INTO variant_base_tiers (id, variant_id, tier, min_qty, unit_price, updated_at) VALUES ($1, $2, $3, $4, $5, NOW()) ON CONFLICT (variant_id, tier) DO UPDATE SET min_qty = $4, unit_price = $5, updated_at = NOW()")
            .bind(Uuid::now_v7()).bind(id).bind(t.tier.code()).bind(t.min_qty as i32).bind(t.unit_price)
            .execute(&s.db).await.map_err(internal)?;
    }
    // Upsert first, then drop bands missing from the new definition: the
    // variant is never left without pricing mid-save.
    let keep: Vec<String> = r.tiers.iter().map(|t| t.tier.code().to_string()).collect();
    sqlx::query("DELETE FROM variant_base_tiers WHERE variant_id = $1 AND NOT (tier = ANY($2))")
        .bind(id).bind(&keep).execute(&s.db).await.map_err(internal)?;

    let new_tiers = r.tiers.into_iter().map(|t| VariantBasePrice { tier: t.tier, min_qty: t.min_qty, unit_price: t.unit_price }).collect();
    pricing.apply_base_change(new_tiers, &settings);
    store_market_cells(&s.db, &pricing).await?;
    for event in pricing.take_events() {
        tracing::info!(?event, "pricing event");
    }
    Ok(Json(VariantPricingResponse::from_pricing(&pricing)))
}

async fn get_market_prices(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<VariantPricingResponse>, HandlerError> {
    let settings = load_settings(&s.db).await?;
    let pricing = load_variant_pricing(&s.db, id, &settings).await?;
    Ok(Json(VariantPricingResponse::from_pricing(&pricing)))
}

#[derive(Debug, Deserialize)]
pub struct EditMarketCellsRequest { pub cells: Vec<MarketCellWrite> }

#[derive(Debug, Deserialize)]
pub struct MarketCellWrite { pub market: Market, pub tier: Tier, pub percent: Option<Decimal>, pub price: Option<Decimal> }

/// Applies operator edits cell by cell. A percent edit re-derives the price,
/// a price edit re-derives the percent; an empty edit is coerced to percent 0,
/// the same normalization the admin UI applies to malformed input.
async fn put_market_prices(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<EditMarketCellsRequest>) -> Result<Json<VariantPricingResponse>, HandlerError> {
    let settings = load_settings(&s.db).await?;
    let mut pricing = load_variant_pricing(&s.db, id, &settings).await?;
    for cell in r.cells {
        match (cell.percent, cell.price) {
            (Some(percent), _) => pricing.set_percent(cell.market, cell.tier, percent, &settings),
            (None, Some(price)) => pricing.set_price(cell.market, cell.tier, price, &settings),
            (None, None) => pricing.set_percent(cell.market, cell.tier, Decimal::ZERO, &settings),
        }
    }
    store_market_cells(&s.db, &pricing).await?;
    for event in pricing.take_events() {
        tracing::info!(?event, "pricing event");
    }
    Ok(Json(VariantPricingResponse::from_pricing(&pricing)))
}

// =============================================================================
// Quotes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteRequest { pub market: Market, pub tier: Option<Tier>, pub lines: Vec<QuoteLineRequest> }

#[derive(Debug, Deserialize)]
pub struct QuoteLineRequest {
    pub variant_id: Uuid,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub add_ons: AddOns,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse { pub market: Market, pub tier: Tier, pub lines: Vec<QuoteLineBreakdown>, pub totals: QuoteTotals, pub meets_minimum: bool }

#[derive(Debug, Serialize)]
pub struct QuoteLineBreakdown { pub variant_id: Uuid, pub quantity: u32, pub unit_price: Decimal, pub add_on_cost: Decimal, pub line_total: Decimal }

/// Prices a quote against the stored pricing rows. The last line plays the
/// "focused line" role: its quantity drives the automatic tier selection
/// unless the request pins a tier explicitly.
async fn create_quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<QuoteResponse>, HandlerError> {
    let settings = load_settings(&s.db).await?;
    let pinned = r.tier.is_some();
    let mut quote = match r.tier { Some(tier) => Quote::with_tier(r.market, tier), None => Quote::new(r.market) };
    for line in &r.lines {
        let pricing = load_variant_pricing(&s.db, line.variant_id, &settings).await?;
        quote.add_line(pricing, line.quantity, line.add_ons);
    }
    if !pinned && !quote.is_empty() {
        let focused = quote.lines().len() - 1;
        let quantity = quote.lines()[focused].quantity;
        quote.set_quantity(focused, quantity).map_err(internal)?;
    }

    let lines = quote.lines().iter().map(|line| {
        let unit_price = quote.unit_price(line);
        QuoteLineBreakdown {
            variant_id: line.pricing.variant_id(),
            quantity: line.quantity,
            unit_price,
            add_on_cost: line.add_on_cost(unit_price, &settings),
            line_total: quote.line_total(line, &settings),
        }
    }).collect();
    let totals = quote.totals(&settings);
    let meets_minimum = quote.meets_minimum(&settings);
    for event in quote.take_events() {
        tracing::info!(?event, "quote event");
    }
    Ok(Json(QuoteResponse { market: quote.market(), tier: quote.selected_tier(), lines, totals, meets_minimum }))
}
