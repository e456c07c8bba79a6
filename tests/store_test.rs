// Integration tests for the domain store

use civica::engine;
use civica::store::{
    AllocationSubmission, ExplanationSubmission, NewAllocation, NewDataSource, NewProposal,
    NewRegion, Store, VoteChoice,
};
use serde_json::json;

fn region(region_id: &str) -> NewRegion {
    NewRegion {
        region_id: region_id.to_string(),
        name: format!("Region {region_id}"),
        county: "Test County".to_string(),
        population: 120_000,
        area_sq_km: 840.0,
        poverty_index: 0.8,
        unemployment_rate: 0.4,
        education_index: 0.5,
        health_index: 0.5,
        deforestation_rate: 0.6,
        air_quality_index: 0.3,
        water_scarcity: 0.7,
        project_impact_score: 0.9,
        infrastructure_need: 0.6,
        corruption_risk: 0.3,
    }
}

fn allocation_submission(region_id: &str) -> AllocationSubmission {
    AllocationSubmission {
        region_id: region_id.to_string(),
        region_name: None,
        poverty_index: 0.8,
        project_impact: 0.7,
        environmental_score: 0.5,
        corruption_risk: 0.2,
        notes: "drought year".to_string(),
        urls: vec![],
        files_attached: 1,
    }
}

#[tokio::test]
async fn test_region_crud_and_priority() {
    let store = Store::open_in_memory().unwrap();

    let created = store.create_region(&region("R-1")).await.unwrap();
    // 0.8*0.4 + 0.9*0.3 + 0.6*0.2 - 0.3*0.1 = 0.68
    assert!((created.priority_score - 0.68).abs() < 1e-9);

    // Duplicate region_id is a validation error, not a crash
    let dup = store.create_region(&region("R-1")).await;
    assert!(dup.is_err());

    let mut update = region("R-1");
    update.poverty_index = 0.9;
    let updated = store.update_region("R-1", &update).await.unwrap();
    assert!((updated.poverty_index - 0.9).abs() < 1e-9);

    // Priority is not recomputed until asked
    assert!((updated.priority_score - 0.68).abs() < 1e-9);
    let recalced = store.recalc_region_priority("R-1").await.unwrap();
    assert!((recalced.priority_score - 0.72).abs() < 1e-9);
    assert!(recalced.last_assessment.is_some());

    store.delete_region("R-1").await.unwrap();
    assert!(store.get_region("R-1").await.is_err());
}

#[tokio::test]
async fn test_regions_listed_by_priority() {
    let store = Store::open_in_memory().unwrap();

    let mut low = region("R-low");
    low.poverty_index = 0.1;
    low.project_impact_score = 0.1;
    low.deforestation_rate = 0.1;
    store.create_region(&low).await.unwrap();
    store.create_region(&region("R-high")).await.unwrap();

    let regions = store.list_regions().await.unwrap();
    assert_eq!(regions[0].region_id, "R-high");
    assert_eq!(regions[1].region_id, "R-low");
}

#[tokio::test]
async fn test_allocation_lifecycle() {
    let store = Store::open_in_memory().unwrap();
    store.create_region(&region("R-1")).await.unwrap();

    let new = NewAllocation {
        region_id: "R-1".to_string(),
        amount: 2_500_000.0,
        fiscal_year: 2026,
        quarter: 3,
        explanation: "priority region".to_string(),
        explanation_factors: json!({"poverty": 0.32}),
    };
    let allocation = store.create_allocation(&new).await.unwrap();
    assert_eq!(allocation.status, "pending");
    assert!((allocation.priority_score_snapshot - 0.68).abs() < 1e-9);

    // Same region/year/quarter is unique
    assert!(store.create_allocation(&new).await.is_err());

    // Disbursing before approval is an invalid transition
    assert!(store.disburse_allocation(&allocation.allocation_id).await.is_err());

    let approved = store.approve_allocation(&allocation.allocation_id).await.unwrap();
    assert_eq!(approved.status, "approved");
    assert!(approved.approved_at.is_some());

    // Approval mirrors the amount onto the region
    let r = store.get_region("R-1").await.unwrap();
    assert!((r.current_allocation - 2_500_000.0).abs() < 1e-9);

    let disbursed = store.disburse_allocation(&allocation.allocation_id).await.unwrap();
    assert_eq!(disbursed.status, "disbursed");

    let completed = store.complete_allocation(&allocation.allocation_id).await.unwrap();
    assert_eq!(completed.status, "completed");

    // Terminal states cannot be re-approved
    assert!(store.approve_allocation(&allocation.allocation_id).await.is_err());
}

#[tokio::test]
async fn test_deleting_region_cascades_allocations() {
    let store = Store::open_in_memory().unwrap();
    store.create_region(&region("R-1")).await.unwrap();
    let allocation = store
        .create_allocation(&NewAllocation {
            region_id: "R-1".to_string(),
            amount: 1000.0,
            fiscal_year: 2026,
            quarter: 1,
            explanation: String::new(),
            explanation_factors: json!({}),
        })
        .await
        .unwrap();

    store.delete_region("R-1").await.unwrap();
    assert!(store.get_allocation(&allocation.allocation_id).await.is_err());
}

#[tokio::test]
async fn test_proposal_voting_flow() {
    let store = Store::open_in_memory().unwrap();

    let proposal = store
        .create_proposal(&NewProposal {
            title: "Borehole program".to_string(),
            description: "Water access for the north".to_string(),
            proposal_type: "project".to_string(),
            region_id: None,
            requested_amount: Some(400_000.0),
            quorum_required: 3,
        })
        .await
        .unwrap();
    assert_eq!(proposal.status, "draft");

    // Voting before the proposal opens is rejected
    assert!(store
        .cast_vote(&proposal.proposal_id, "amina", VoteChoice::For, "")
        .await
        .is_err());

    store.submit_proposal(&proposal.proposal_id).await.unwrap();
    store.open_proposal_voting(&proposal.proposal_id).await.unwrap();

    store
        .cast_vote(&proposal.proposal_id, "amina", VoteChoice::For, "needed")
        .await
        .unwrap();
    store
        .cast_vote(&proposal.proposal_id, "brian", VoteChoice::For, "")
        .await
        .unwrap();

    // Double voting is rejected
    assert!(store
        .cast_vote(&proposal.proposal_id, "amina", VoteChoice::Against, "")
        .await
        .is_err());

    // Quorum of 3 not yet reached
    let p = store.get_proposal(&proposal.proposal_id).await.unwrap();
    assert!(!p.approval_reached());

    store
        .cast_vote(&proposal.proposal_id, "carol", VoteChoice::For, "")
        .await
        .unwrap();

    let finalized = store.finalize_proposal(&proposal.proposal_id).await.unwrap();
    assert_eq!(finalized.status, "approved");
    assert_eq!(finalized.approved_amount, Some(400_000.0));

    let votes = store.list_votes(&proposal.proposal_id).await.unwrap();
    assert_eq!(votes.len(), 3);
}

#[tokio::test]
async fn test_proposal_rejected_without_majority() {
    let store = Store::open_in_memory().unwrap();
    let proposal = store
        .create_proposal(&NewProposal {
            title: "Stadium".to_string(),
            description: String::new(),
            proposal_type: "budget".to_string(),
            region_id: None,
            requested_amount: Some(9_000_000.0),
            quorum_required: 2,
        })
        .await
        .unwrap();

    store.submit_proposal(&proposal.proposal_id).await.unwrap();
    store.open_proposal_voting(&proposal.proposal_id).await.unwrap();
    store
        .cast_vote(&proposal.proposal_id, "a", VoteChoice::For, "")
        .await
        .unwrap();
    store
        .cast_vote(&proposal.proposal_id, "b", VoteChoice::Against, "")
        .await
        .unwrap();

    let finalized = store.finalize_proposal(&proposal.proposal_id).await.unwrap();
    assert_eq!(finalized.status, "rejected");
    assert_eq!(finalized.approved_amount, None);
}

#[tokio::test]
async fn test_allocation_request_lifecycle() {
    let store = Store::open_in_memory().unwrap();

    let record = store
        .create_allocation_request(&allocation_submission("R-9"))
        .await
        .unwrap();
    assert_eq!(record.status, "pending");
    assert_eq!(record.region_name, "R-9");

    store
        .mark_allocation_request_processing(&record.request_id)
        .await
        .unwrap();

    // Reviewing before analysis is an invalid transition
    assert!(store
        .review_allocation_request(&record.request_id, true)
        .await
        .is_err());

    let result = json!({
        "recommendation": {
            "priority_level": "high",
            "confidence_score": 0.91,
            "recommended_allocation_percentage": 65.0,
            "rationale": "strong need signals",
            "key_findings": ["high poverty"],
            "recommendations": ["fund water projects"],
        }
    });
    let analyzed = store
        .apply_allocation_result(&record.request_id, &result)
        .await
        .unwrap();
    assert_eq!(analyzed.status, "analyzed");
    assert_eq!(analyzed.priority_level, "high");
    assert_eq!(analyzed.ai_recommendation, "strong need signals");
    assert_eq!(analyzed.key_findings[0], "high poverty");
    assert!(analyzed.analyzed_at.is_some());

    let approved = store
        .review_allocation_request(&record.request_id, true)
        .await
        .unwrap();
    assert_eq!(approved.status, "approved");
}

#[tokio::test]
async fn test_allocation_request_engine_fallback_result() {
    let store = Store::open_in_memory().unwrap();
    let submission = allocation_submission("R-2");
    let record = store.create_allocation_request(&submission).await.unwrap();

    let verdict = engine::calculate(&submission.metrics()).unwrap();
    let analyzed = store
        .apply_allocation_engine_result(&record.request_id, &verdict)
        .await
        .unwrap();

    assert_eq!(analyzed.status, "analyzed");
    assert_eq!(analyzed.priority_level, verdict.priority_level.as_str());
    assert!(analyzed.priority_score.is_some());
}

#[tokio::test]
async fn test_allocation_request_filters_and_paging() {
    let store = Store::open_in_memory().unwrap();

    for i in 0..5 {
        store
            .create_allocation_request(&allocation_submission(&format!("R-{i}")))
            .await
            .unwrap();
    }
    let r0 = store
        .list_allocation_requests(None, Some("R-0"), 10, 0)
        .await
        .unwrap();
    assert_eq!(r0.len(), 1);

    let pending = store
        .list_allocation_requests(Some("pending"), None, 3, 0)
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);

    let rest = store
        .list_allocation_requests(Some("pending"), None, 3, 3)
        .await
        .unwrap();
    assert_eq!(rest.len(), 2);
}

#[tokio::test]
async fn test_explanation_request_lifecycle() {
    let store = Store::open_in_memory().unwrap();

    let record = store
        .create_explanation_request(&ExplanationSubmission {
            region_id: "R-1".to_string(),
            region_name: Some("North".to_string()),
            allocation_data: json!({"priority_score": 0.7}),
            context: "post-drought".to_string(),
            language: "simple".to_string(),
            notes: String::new(),
            files_attached: 0,
        })
        .await
        .unwrap();
    assert_eq!(record.status, "pending");

    let result = json!({
        "explanation": {
            "text": "Funding goes north because need is highest there.",
            "key_points": ["highest poverty"],
            "policy_implications": ["review quarterly"],
            "transparency_score": 0.9,
        }
    });
    let completed = store
        .apply_explanation_result(&record.request_id, &result)
        .await
        .unwrap();
    assert_eq!(completed.status, "completed");
    assert!(completed.explanation_text.contains("north"));
    assert_eq!(completed.transparency_score, Some(0.9));

    let rejected = store
        .review_explanation_request(&record.request_id, false)
        .await
        .unwrap();
    assert_eq!(rejected.status, "rejected");
}

#[tokio::test]
async fn test_review_queue_counts() {
    let store = Store::open_in_memory().unwrap();

    let a = store
        .create_allocation_request(&allocation_submission("R-1"))
        .await
        .unwrap();
    store
        .create_allocation_request(&allocation_submission("R-2"))
        .await
        .unwrap();
    store
        .mark_allocation_request_processing(&a.request_id)
        .await
        .unwrap();

    let queue = store.review_queue().await.unwrap();
    assert_eq!(queue.allocation_pending, 1);
    assert_eq!(queue.allocation_processing, 1);
    assert_eq!(queue.explanation_pending, 0);
}

#[tokio::test]
async fn test_data_source_usage_tracking() {
    let store = Store::open_in_memory().unwrap();

    let source = store
        .create_data_source(&NewDataSource {
            title: "National poverty survey".to_string(),
            description: "2025 household survey".to_string(),
            source_type: "url".to_string(),
            category: "research".to_string(),
            url: Some("https://stats.example/poverty-2025".to_string()),
            file_path: None,
            tags: "poverty,survey".to_string(),
            summary: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(source.usage_count, 0);
    assert!(source.last_used.is_none());

    let used = store.record_source_usage(source.id).await.unwrap();
    assert_eq!(used.usage_count, 1);
    assert!(used.last_used.is_some());
    assert_eq!(used.source_location(), Some("https://stats.example/poverty-2025"));

    store.delete_data_source(source.id).await.unwrap();
    assert!(store.get_data_source(source.id).await.is_err());
}

#[tokio::test]
async fn test_dashboard_snapshot_aggregates() {
    let store = Store::open_in_memory().unwrap();

    store.create_region(&region("R-1")).await.unwrap();
    store.create_region(&region("R-2")).await.unwrap();

    let allocation = store
        .create_allocation(&NewAllocation {
            region_id: "R-1".to_string(),
            amount: 1_000_000.0,
            fiscal_year: 2026,
            quarter: 1,
            explanation: String::new(),
            explanation_factors: json!({}),
        })
        .await
        .unwrap();
    store.approve_allocation(&allocation.allocation_id).await.unwrap();
    store.disburse_allocation(&allocation.allocation_id).await.unwrap();

    store
        .create_allocation_request(&allocation_submission("R-2"))
        .await
        .unwrap();

    let snapshot = store.dashboard_snapshot().await.unwrap();
    assert_eq!(snapshot.total_regions, 2);
    assert_eq!(snapshot.regions_funded, 1);
    assert!((snapshot.total_allocated - 1_000_000.0).abs() < 1e-9);
    assert!((snapshot.total_disbursed - 1_000_000.0).abs() < 1e-9);
    assert_eq!(snapshot.allocation_requests_total, 1);
    assert_eq!(snapshot.allocation_requests_pending, 1);
    assert!(snapshot.average_priority_score > 0.0);
}
