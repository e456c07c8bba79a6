// Proposal and vote rows
//
// Lifecycle: draft -> in_review -> voting -> approved/rejected. One vote per
// voter per proposal; tallies live on the proposal row and are updated in
// the same transaction as the vote insert.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::allocation::guard_transition;
use super::{constraint_to_validation, now_rfc3339, Store};
use crate::error::{Error, Result};

const PROPOSAL_TYPES: &[&str] = &["allocation", "policy", "project", "budget", "quarterly"];

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub id: i64,
    pub proposal_id: String,
    pub title: String,
    pub description: String,
    pub proposal_type: String,
    pub region_id: Option<String>,
    pub requested_amount: Option<f64>,
    pub approved_amount: Option<f64>,
    pub status: String,
    pub votes_for: i64,
    pub votes_against: i64,
    pub quorum_required: i64,
    pub created_at: String,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
}

impl Proposal {
    /// Quorum reached and a strict majority in favor.
    pub fn approval_reached(&self) -> bool {
        let total = self.votes_for + self.votes_against;
        total >= self.quorum_required && self.votes_for > self.votes_against
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProposal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_type")]
    pub proposal_type: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub requested_amount: Option<f64>,
    #[serde(default = "default_quorum")]
    pub quorum_required: i64,
}

fn default_type() -> String {
    "allocation".to_string()
}
fn default_quorum() -> i64 {
    3
}

impl NewProposal {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if !PROPOSAL_TYPES.contains(&self.proposal_type.as_str()) {
            return Err(Error::validation(format!(
                "unknown proposal_type: {}",
                self.proposal_type
            )));
        }
        if let Some(amount) = self.requested_amount {
            if amount <= 0.0 || !amount.is_finite() {
                return Err(Error::validation("requested_amount must be positive"));
            }
        }
        if self.quorum_required < 1 {
            return Err(Error::validation("quorum_required must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::For => "for",
            VoteChoice::Against => "against",
            VoteChoice::Abstain => "abstain",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter: String,
    pub choice: String,
    pub comment: String,
    pub voted_at: String,
}

const PROPOSAL_COLUMNS: &str = "p.id, p.proposal_id, p.title, p.description, p.proposal_type, \
     r.region_id, p.requested_amount, p.approved_amount, p.status, p.votes_for, \
     p.votes_against, p.quorum_required, p.created_at, p.submitted_at, p.approved_at";

fn proposal_from_row(row: &Row) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        proposal_type: row.get(4)?,
        region_id: row.get(5)?,
        requested_amount: row.get(6)?,
        approved_amount: row.get(7)?,
        status: row.get(8)?,
        votes_for: row.get(9)?,
        votes_against: row.get(10)?,
        quorum_required: row.get(11)?,
        created_at: row.get(12)?,
        submitted_at: row.get(13)?,
        approved_at: row.get(14)?,
    })
}

impl Store {
    pub async fn create_proposal(&self, new: &NewProposal) -> Result<Proposal> {
        new.validate()?;

        let region_pk = match &new.region_id {
            Some(rid) => Some(self.get_region(rid).await?.id),
            None => None,
        };

        let proposal_id = Uuid::new_v4().to_string();
        let now = now_rfc3339();

        {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO proposals (proposal_id, title, description, proposal_type, \
                 region_id, requested_amount, quorum_required, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'draft', ?8)",
                params![
                    proposal_id,
                    new.title,
                    new.description,
                    new.proposal_type,
                    region_pk,
                    new.requested_amount,
                    new.quorum_required,
                    now,
                ],
            )?;
        }

        self.get_proposal(&proposal_id).await
    }

    pub async fn list_proposals(&self) -> Result<Vec<Proposal>> {
        let conn = self.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals p \
             LEFT JOIN regions r ON r.id = p.region_id ORDER BY p.created_at DESC"
        ))?;
        let proposals = stmt
            .query_map([], proposal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(proposals)
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let conn = self.lock().await;
        conn.query_row(
            &format!(
                "SELECT {PROPOSAL_COLUMNS} FROM proposals p \
                 LEFT JOIN regions r ON r.id = p.region_id WHERE p.proposal_id = ?1"
            ),
            params![proposal_id],
            proposal_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("proposal", proposal_id))
    }

    /// draft -> in_review.
    pub async fn submit_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let proposal = self.get_proposal(proposal_id).await?;
        guard_transition(&proposal.status, "draft", "in_review")?;

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE proposals SET status = 'in_review', submitted_at = ?1 \
                 WHERE proposal_id = ?2",
                params![now, proposal_id],
            )?;
        }
        self.get_proposal(proposal_id).await
    }

    /// in_review -> voting.
    pub async fn open_proposal_voting(&self, proposal_id: &str) -> Result<Proposal> {
        let proposal = self.get_proposal(proposal_id).await?;
        guard_transition(&proposal.status, "in_review", "voting")?;

        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE proposals SET status = 'voting' WHERE proposal_id = ?1",
                params![proposal_id],
            )?;
        }
        self.get_proposal(proposal_id).await
    }

    /// Record a vote. Only open proposals accept votes; one vote per voter.
    pub async fn cast_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        choice: VoteChoice,
        comment: &str,
    ) -> Result<Proposal> {
        if voter.trim().is_empty() {
            return Err(Error::validation("voter is required"));
        }

        let proposal = self.get_proposal(proposal_id).await?;
        if proposal.status != "voting" {
            return Err(Error::validation(format!(
                "proposal is not open for voting (status: {})",
                proposal.status
            )));
        }

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO votes (proposal_id, voter, choice, comment, voted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![proposal.id, voter, choice.as_str(), comment, now],
            )
            .map_err(|e| {
                constraint_to_validation(e, &format!("{voter} has already voted on this proposal"))
            })?;

            match choice {
                VoteChoice::For => {
                    conn.execute(
                        "UPDATE proposals SET votes_for = votes_for + 1 WHERE id = ?1",
                        params![proposal.id],
                    )?;
                }
                VoteChoice::Against => {
                    conn.execute(
                        "UPDATE proposals SET votes_against = votes_against + 1 WHERE id = ?1",
                        params![proposal.id],
                    )?;
                }
                VoteChoice::Abstain => {}
            }
        }

        self.get_proposal(proposal_id).await
    }

    pub async fn list_votes(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        let proposal = self.get_proposal(proposal_id).await?;
        let conn = self.lock().await;
        let mut stmt = conn.prepare(
            "SELECT voter, choice, comment, voted_at FROM votes \
             WHERE proposal_id = ?1 ORDER BY voted_at ASC",
        )?;
        let votes = stmt
            .query_map(params![proposal.id], |row| {
                Ok(Vote {
                    proposal_id: proposal.proposal_id.clone(),
                    voter: row.get(0)?,
                    choice: row.get(1)?,
                    comment: row.get(2)?,
                    voted_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }

    /// voting -> approved/rejected, decided by tally against quorum.
    pub async fn finalize_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let proposal = self.get_proposal(proposal_id).await?;
        guard_transition(&proposal.status, "voting", "approved")?;

        let approved = proposal.approval_reached();
        let now = now_rfc3339();

        {
            let conn = self.lock().await;
            if approved {
                conn.execute(
                    "UPDATE proposals SET status = 'approved', approved_at = ?1, \
                     approved_amount = requested_amount WHERE proposal_id = ?2",
                    params![now, proposal_id],
                )?;
            } else {
                conn.execute(
                    "UPDATE proposals SET status = 'rejected' WHERE proposal_id = ?1",
                    params![proposal_id],
                )?;
            }
        }
        self.get_proposal(proposal_id).await
    }
}
