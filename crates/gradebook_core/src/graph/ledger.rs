//! crates/gradebook_core/src/graph/ledger.rs
//!
//! The grades of one student in one subject, with the average the server computes
//! over them and the final assessment once it is set.
//!
//! Every update re-derives state from a fresh fetch instead of applying deltas, so
//! replaying an event leaves the ledger as it was after the first application.
//! Fetches complete before anything cached is swapped.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::Api;
use crate::cache::Lazy;
use crate::domain::{AssessmentInfo, AverageGrade, EntityId, FinalAssessmentInfo};
use crate::endpoints;
use crate::events::{Outcome, PushEvent};
use crate::ports::{PortError, PortResult};

use super::StudentView;

/// Which view of a ledger this is. The teacher view can change grades; the others
/// read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerScope {
    Student {
        view: StudentView,
        subject_id: EntityId,
    },
    Teacher {
        subject_id: EntityId,
        class_id: EntityId,
        student_id: EntityId,
    },
}

impl LedgerScope {
    fn root(&self) -> String {
        match self {
            LedgerScope::Student { view, subject_id } => endpoints::ledger(&view.root(), *subject_id),
            LedgerScope::Teacher {
                subject_id,
                class_id,
                student_id,
            } => endpoints::student_ledger(*subject_id, *class_id, *student_id),
        }
    }

    fn assessments(&self) -> String {
        format!("{}/assessments", self.root())
    }

    fn assessment(&self, assessment_id: EntityId) -> String {
        format!("{}/assessments/{}", self.root(), assessment_id)
    }

    fn average(&self) -> String {
        format!("{}/average", self.root())
    }

    fn final_assessment(&self) -> String {
        format!("{}/final-assessment", self.root())
    }
}

#[derive(Debug)]
pub struct GradeLedger {
    scope: LedgerScope,
    assessments: Mutex<Vec<AssessmentInfo>>,
    average: Mutex<Option<f64>>,
    final_assessment: Mutex<Option<FinalAssessmentInfo>>,
    api: Api,
}

impl GradeLedger {
    /// A lazily loaded ledger for `scope`.
    pub(crate) fn lazy(scope: LedgerScope, api: Api) -> Lazy<Arc<GradeLedger>> {
        Lazy::new(move || {
            let api = api.clone();
            async move { GradeLedger::load(scope, api).await.map(Arc::new) }
        })
    }

    async fn load(scope: LedgerScope, api: Api) -> PortResult<Self> {
        let assessments_path = scope.assessments();
        let final_path = scope.final_assessment();
        let (assessments, average, final_assessment) = tokio::try_join!(
            api.get::<Vec<AssessmentInfo>>(&assessments_path),
            fetch_average(&api, &scope),
            api.get::<Option<FinalAssessmentInfo>>(&final_path),
        )?;
        debug!("Loaded {} assessments for {:?}", assessments.len(), scope);
        Ok(Self {
            scope,
            assessments: Mutex::new(assessments),
            average: Mutex::new(average),
            final_assessment: Mutex::new(final_assessment),
            api,
        })
    }

    pub fn scope(&self) -> LedgerScope {
        self.scope
    }

    /// Newest first.
    pub fn assessments(&self) -> Vec<AssessmentInfo> {
        self.assessments.lock().clone()
    }

    pub fn assessment(&self, assessment_id: EntityId) -> Option<AssessmentInfo> {
        self.assessments
            .lock()
            .iter()
            .find(|a| a.id == assessment_id)
            .cloned()
    }

    pub fn average(&self) -> Option<f64> {
        *self.average.lock()
    }

    pub fn final_assessment(&self) -> Option<FinalAssessmentInfo> {
        self.final_assessment.lock().clone()
    }

    /// Re-fetches the average and swaps it in.
    pub async fn refresh_average(&self) -> PortResult<Option<f64>> {
        let average = fetch_average(&self.api, &self.scope).await?;
        *self.average.lock() = average;
        Ok(average)
    }

    //=====================================================================================
    // Teacher operations
    //=====================================================================================

    pub async fn add_assessment(
        &self,
        grade: &str,
        comment: Option<&str>,
    ) -> PortResult<AssessmentInfo> {
        self.require_teacher()?;
        let created: AssessmentInfo = self
            .api
            .post(&self.scope.assessments(), &json!({ "grade": grade, "comment": comment }))
            .await?;
        self.upsert(created.clone());
        self.refresh_average_after_write().await;
        Ok(created)
    }

    pub async fn change_assessment(
        &self,
        assessment_id: EntityId,
        grade: &str,
        comment: Option<&str>,
    ) -> PortResult<AssessmentInfo> {
        self.require_teacher()?;
        let changed: AssessmentInfo = self
            .api
            .put(
                &self.scope.assessment(assessment_id),
                &json!({ "grade": grade, "comment": comment }),
            )
            .await?;
        self.upsert(changed.clone());
        self.refresh_average_after_write().await;
        Ok(changed)
    }

    pub async fn delete_assessment(&self, assessment_id: EntityId) -> PortResult<()> {
        self.require_teacher()?;
        self.api.delete(&self.scope.assessment(assessment_id)).await?;
        self.assessments.lock().retain(|a| a.id != assessment_id);
        self.refresh_average_after_write().await;
        Ok(())
    }

    pub async fn set_final_assessment(&self, grade: &str) -> PortResult<FinalAssessmentInfo> {
        self.require_teacher()?;
        let final_assessment: FinalAssessmentInfo = self
            .api
            .post(&self.scope.final_assessment(), &json!({ "grade": grade }))
            .await?;
        *self.final_assessment.lock() = Some(final_assessment.clone());
        Ok(final_assessment)
    }

    /// The write already went through, so a failed average fetch only leaves the
    /// previous average in place until the matching push event refreshes it.
    async fn refresh_average_after_write(&self) {
        if let Err(e) = self.refresh_average().await {
            warn!("Average for {:?} not refreshed after a grade change: {}", self.scope, e);
        }
    }

    //=====================================================================================
    // Event application
    //=====================================================================================

    /// Applies any assessment or final-assessment event addressed to this ledger.
    pub(crate) async fn apply_event(&self, event: &PushEvent) -> PortResult<Outcome> {
        match event {
            PushEvent::AssessmentCreated(r) | PushEvent::AssessmentChanged(r) => {
                self.apply_assessment_upsert(r.assessment_id).await
            }
            PushEvent::AssessmentDeleted(r) => self.apply_assessment_deleted(r.assessment_id).await,
            PushEvent::FinalAssessmentCreated { .. } => self.apply_final_assessment().await,
            _ => Ok(Outcome::Dropped),
        }
    }

    /// assessment-created and assessment-changed.
    pub(crate) async fn apply_assessment_upsert(&self, assessment_id: EntityId) -> PortResult<Outcome> {
        let path = self.scope.assessment(assessment_id);
        let (fresh, average) = tokio::try_join!(
            self.api.get::<AssessmentInfo>(&path),
            fetch_average(&self.api, &self.scope),
        )?;
        self.upsert(fresh);
        *self.average.lock() = average;
        Ok(Outcome::Applied)
    }

    pub(crate) async fn apply_assessment_deleted(&self, assessment_id: EntityId) -> PortResult<Outcome> {
        let average = fetch_average(&self.api, &self.scope).await?;
        self.assessments.lock().retain(|a| a.id != assessment_id);
        *self.average.lock() = average;
        Ok(Outcome::Applied)
    }

    pub(crate) async fn apply_final_assessment(&self) -> PortResult<Outcome> {
        let fresh: Option<FinalAssessmentInfo> =
            self.api.get(&self.scope.final_assessment()).await?;
        *self.final_assessment.lock() = fresh;
        Ok(Outcome::Applied)
    }

    fn upsert(&self, assessment: AssessmentInfo) {
        let mut assessments = self.assessments.lock();
        match assessments.iter_mut().find(|a| a.id == assessment.id) {
            Some(slot) => *slot = assessment,
            None => assessments.insert(0, assessment),
        }
    }

    fn require_teacher(&self) -> PortResult<()> {
        match self.scope {
            LedgerScope::Teacher { .. } => Ok(()),
            LedgerScope::Student { .. } => Err(PortError::Forbidden(
                "only teachers can change grades".to_string(),
            )),
        }
    }
}

async fn fetch_average(api: &Api, scope: &LedgerScope) -> PortResult<Option<f64>> {
    let summary: AverageGrade = api.get(&scope.average()).await?;
    Ok(summary.average)
}
