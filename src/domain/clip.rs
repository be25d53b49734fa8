//! Creator clip submissions.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ActorId, CampaignId, ClipId};
use crate::error::SettlementError;

/// Review status of a clip. Transitions are one-way out of `InReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// Awaiting admin review.
    InReview,
    /// Approved; counts toward views and payouts.
    Accepted,
    /// Declined.
    Rejected,
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InReview => "in_review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        })
    }
}

/// A creator's submission to a campaign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Clip {
    /// Clip id.
    pub id: ClipId,
    /// Campaign the clip was submitted to.
    pub campaign_id: CampaignId,
    /// Submitting creator.
    pub creator_id: ActorId,
    /// Public URL of the post.
    pub clip_url: String,
    /// Review status.
    pub status: ClipStatus,
    /// Latest polled view count.
    pub view_count: u64,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
    /// Reviewer feedback, set on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Platform media id, once accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Post caption, once accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Platform posting time, once accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
}

impl Clip {
    /// Creates a clip awaiting review.
    #[must_use]
    pub fn new(campaign_id: CampaignId, creator_id: ActorId, clip_url: String) -> Self {
        Self {
            id: ClipId::new(),
            campaign_id,
            creator_id,
            clip_url,
            status: ClipStatus::InReview,
            view_count: 0,
            submitted_at: Utc::now(),
            feedback: None,
            media_id: None,
            caption: None,
            posted_at: None,
        }
    }

    /// Returns `true` if the clip counts toward views and payouts.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == ClipStatus::Accepted
    }

    /// Moves the clip out of review.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidState`] if the clip was already
    /// reviewed, and [`SettlementError::InvalidRequest`] if `to` is
    /// `InReview`.
    pub fn review(&mut self, to: ClipStatus, feedback: Option<String>) -> Result<(), SettlementError> {
        if self.status != ClipStatus::InReview {
            return Err(SettlementError::InvalidState(format!(
                "clip {} was already reviewed ({})",
                self.id, self.status
            )));
        }
        if to == ClipStatus::InReview {
            return Err(SettlementError::InvalidRequest(
                "review status must be accepted or rejected".to_string(),
            ));
        }
        self.status = to;
        self.feedback = feedback;
        Ok(())
    }
}

/// Central store of clips.
///
/// Clips are small and mostly read in bulk per campaign, so a single
/// `RwLock` over the map is enough.
#[derive(Debug, Default)]
pub struct ClipBook {
    clips: RwLock<HashMap<ClipId, Clip>>,
}

impl ClipBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a clip.
    pub async fn insert(&self, clip: Clip) -> ClipId {
        let id = clip.id;
        self.clips.write().await.insert(id, clip);
        id
    }

    /// Returns a snapshot of a clip.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ClipNotFound`] for unknown ids.
    pub async fn get(&self, id: ClipId) -> Result<Clip, SettlementError> {
        self.clips
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SettlementError::ClipNotFound(id))
    }

    /// Applies `f` to a clip under the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ClipNotFound`] for unknown ids, or the
    /// error returned by `f`.
    pub async fn update<T>(
        &self,
        id: ClipId,
        f: impl FnOnce(&mut Clip) -> Result<T, SettlementError>,
    ) -> Result<T, SettlementError> {
        let mut map = self.clips.write().await;
        let clip = map.get_mut(&id).ok_or(SettlementError::ClipNotFound(id))?;
        f(clip)
    }

    /// Removes a clip.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ClipNotFound`] for unknown ids.
    pub async fn remove(&self, id: ClipId) -> Result<Clip, SettlementError> {
        self.clips
            .write()
            .await
            .remove(&id)
            .ok_or(SettlementError::ClipNotFound(id))
    }

    /// Removes every clip of a campaign and returns how many went.
    pub async fn remove_for_campaign(&self, campaign_id: CampaignId) -> usize {
        let mut map = self.clips.write().await;
        let before = map.len();
        map.retain(|_, c| c.campaign_id != campaign_id);
        before - map.len()
    }

    /// All clips of a campaign, oldest first.
    pub async fn for_campaign(&self, campaign_id: CampaignId) -> Vec<Clip> {
        let map = self.clips.read().await;
        let mut clips: Vec<Clip> = map
            .values()
            .filter(|c| c.campaign_id == campaign_id)
            .cloned()
            .collect();
        clips.sort_by_key(|c| c.submitted_at);
        clips
    }

    /// Accepted clips of one creator in one campaign, oldest first.
    pub async fn accepted_for(&self, campaign_id: CampaignId, creator_id: ActorId) -> Vec<Clip> {
        let map = self.clips.read().await;
        let mut clips: Vec<Clip> = map
            .values()
            .filter(|c| c.campaign_id == campaign_id && c.creator_id == creator_id && c.is_accepted())
            .cloned()
            .collect();
        clips.sort_by_key(|c| c.submitted_at);
        clips
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_is_one_way() {
        let mut clip = Clip::new(CampaignId::new(), ActorId::new(), "https://x/p/1".into());
        assert!(clip.review(ClipStatus::Accepted, None).is_ok());
        assert!(clip.is_accepted());
        assert!(matches!(
            clip.review(ClipStatus::Rejected, Some("late".into())),
            Err(SettlementError::InvalidState(_))
        ));
        assert_eq!(clip.status, ClipStatus::Accepted);
    }

    #[test]
    fn review_back_to_in_review_is_rejected() {
        let mut clip = Clip::new(CampaignId::new(), ActorId::new(), "https://x/p/2".into());
        assert!(clip.review(ClipStatus::InReview, None).is_err());
        assert_eq!(clip.status, ClipStatus::InReview);
    }

    #[tokio::test]
    async fn accepted_for_filters_status_and_creator() {
        let book = ClipBook::new();
        let campaign = CampaignId::new();
        let creator = ActorId::new();

        let mut accepted = Clip::new(campaign, creator, "a".into());
        accepted.status = ClipStatus::Accepted;
        let pending = Clip::new(campaign, creator, "b".into());
        let mut other = Clip::new(campaign, ActorId::new(), "c".into());
        other.status = ClipStatus::Accepted;

        book.insert(accepted).await;
        book.insert(pending).await;
        book.insert(other).await;

        assert_eq!(book.accepted_for(campaign, creator).await.len(), 1);
        assert_eq!(book.for_campaign(campaign).await.len(), 3);
    }

    #[tokio::test]
    async fn remove_for_campaign_spares_other_campaigns() {
        let book = ClipBook::new();
        let gone = CampaignId::new();
        let kept = CampaignId::new();
        let creator = ActorId::new();
        book.insert(Clip::new(gone, creator, "a".into())).await;
        book.insert(Clip::new(gone, ActorId::new(), "b".into())).await;
        let survivor = Clip::new(kept, creator, "c".into());
        let survivor_id = survivor.id;
        book.insert(survivor).await;

        assert_eq!(book.remove_for_campaign(gone).await, 2);
        assert!(book.for_campaign(gone).await.is_empty());
        assert!(book.get(survivor_id).await.is_ok());
        assert_eq!(book.remove_for_campaign(gone).await, 0);
    }

    #[tokio::test]
    async fn update_missing_clip_fails() {
        let book = ClipBook::new();
        let result = book.update(ClipId::new(), |_| Ok(())).await;
        assert!(matches!(result, Err(SettlementError::ClipNotFound(_))));
    }
}
