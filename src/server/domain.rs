// Domain CRUD handlers: regions, allocations, proposals, analysis requests,
// and data sources. Thin wrappers over the store; validation and status
// guards live with the row types.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::error::Result;
use crate::store::{
    Allocation, AllocationRequestRecord, DataSource, ExplanationRequestRecord, NewAllocation,
    NewDataSource, NewProposal, NewRegion, Proposal, Region, ReviewQueue, Vote, VoteChoice,
};

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

pub async fn list_regions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Region>>> {
    Ok(Json(state.store.list_regions().await?))
}

pub async fn create_region(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewRegion>,
) -> Result<Json<Region>> {
    Ok(Json(state.store.create_region(&new).await?))
}

pub async fn get_region(
    State(state): State<Arc<AppState>>,
    Path(region_id): Path<String>,
) -> Result<Json<Region>> {
    Ok(Json(state.store.get_region(&region_id).await?))
}

pub async fn update_region(
    State(state): State<Arc<AppState>>,
    Path(region_id): Path<String>,
    Json(new): Json<NewRegion>,
) -> Result<Json<Region>> {
    Ok(Json(state.store.update_region(&region_id, &new).await?))
}

pub async fn delete_region(
    State(state): State<Arc<AppState>>,
    Path(region_id): Path<String>,
) -> Result<Json<Value>> {
    state.store.delete_region(&region_id).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn recalc_priority(
    State(state): State<Arc<AppState>>,
    Path(region_id): Path<String>,
) -> Result<Json<Value>> {
    let region = state.store.recalc_region_priority(&region_id).await?;
    Ok(Json(json!({
        "success": true,
        "region": region.name,
        "priority_score": region.priority_score,
        "factors": {
            "poverty_index": region.poverty_index,
            "project_impact": region.project_impact_score,
            "deforestation": region.deforestation_rate,
            "corruption_risk": region.corruption_risk,
        },
    })))
}

// ---------------------------------------------------------------------------
// Allocations
// ---------------------------------------------------------------------------

pub async fn list_allocations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Allocation>>> {
    Ok(Json(state.store.list_allocations().await?))
}

pub async fn create_allocation(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewAllocation>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.create_allocation(&new).await?))
}

pub async fn get_allocation(
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.get_allocation(&allocation_id).await?))
}

pub async fn approve_allocation(
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.approve_allocation(&allocation_id).await?))
}

pub async fn disburse_allocation(
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.disburse_allocation(&allocation_id).await?))
}

pub async fn complete_allocation(
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.complete_allocation(&allocation_id).await?))
}

pub async fn reject_allocation(
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.store.reject_allocation(&allocation_id).await?))
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

pub async fn list_proposals(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Proposal>>> {
    Ok(Json(state.store.list_proposals().await?))
}

pub async fn create_proposal(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewProposal>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.store.create_proposal(&new).await?))
}

pub async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.store.get_proposal(&proposal_id).await?))
}

pub async fn submit_proposal(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.store.submit_proposal(&proposal_id).await?))
}

pub async fn open_voting(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.store.open_proposal_voting(&proposal_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub voter: String,
    pub choice: VoteChoice,
    #[serde(default)]
    pub comment: String,
}

pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
    Json(body): Json<VoteBody>,
) -> Result<Json<Proposal>> {
    Ok(Json(
        state
            .store
            .cast_vote(&proposal_id, &body.voter, body.choice, &body.comment)
            .await?,
    ))
}

pub async fn finalize_proposal(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.store.finalize_proposal(&proposal_id).await?))
}

pub async fn list_votes(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<Vote>>> {
    Ok(Json(state.store.list_votes(&proposal_id).await?))
}

// ---------------------------------------------------------------------------
// Analysis requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RequestFilter {
    pub status: Option<String>,
    pub region_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

pub async fn list_allocation_requests(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<AllocationRequestRecord>>> {
    Ok(Json(
        state
            .store
            .list_allocation_requests(
                filter.status.as_deref(),
                filter.region_id.as_deref(),
                filter.limit,
                filter.offset,
            )
            .await?,
    ))
}

pub async fn get_allocation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<AllocationRequestRecord>> {
    Ok(Json(state.store.get_allocation_request(&request_id).await?))
}

pub async fn approve_allocation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<AllocationRequestRecord>> {
    Ok(Json(
        state.store.review_allocation_request(&request_id, true).await?,
    ))
}

pub async fn reject_allocation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<AllocationRequestRecord>> {
    Ok(Json(
        state
            .store
            .review_allocation_request(&request_id, false)
            .await?,
    ))
}

pub async fn list_explanation_requests(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<ExplanationRequestRecord>>> {
    Ok(Json(
        state
            .store
            .list_explanation_requests(
                filter.status.as_deref(),
                filter.region_id.as_deref(),
                filter.limit,
                filter.offset,
            )
            .await?,
    ))
}

pub async fn get_explanation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<ExplanationRequestRecord>> {
    Ok(Json(state.store.get_explanation_request(&request_id).await?))
}

pub async fn approve_explanation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<ExplanationRequestRecord>> {
    Ok(Json(
        state
            .store
            .review_explanation_request(&request_id, true)
            .await?,
    ))
}

pub async fn reject_explanation_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<ExplanationRequestRecord>> {
    Ok(Json(
        state
            .store
            .review_explanation_request(&request_id, false)
            .await?,
    ))
}

pub async fn review_queue(State(state): State<Arc<AppState>>) -> Result<Json<ReviewQueue>> {
    Ok(Json(state.store.review_queue().await?))
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SourceFilter {
    #[serde(default)]
    pub include_inactive: bool,
    pub category: Option<String>,
}

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SourceFilter>,
) -> Result<Json<Vec<DataSource>>> {
    Ok(Json(
        state
            .store
            .list_data_sources(!filter.include_inactive, filter.category.as_deref())
            .await?,
    ))
}

pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewDataSource>,
) -> Result<Json<DataSource>> {
    Ok(Json(state.store.create_data_source(&new).await?))
}

pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.store.delete_data_source(id).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn use_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DataSource>> {
    Ok(Json(state.store.record_source_usage(id).await?))
}
