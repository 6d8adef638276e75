use log::{info, warn};
use serde::Serialize;

use crate::config::MatrixConfig;
use crate::error::{MatrixError, MatrixResult};
use crate::logic::generate::CombinationGenerator;
use crate::logic::hydrate::{HydratedSet, Hydrator, SkippedVariant};
use crate::logic::image_stager::ImageStager;
use crate::logic::reconcile::{ClientIndexAllocator, RowReconciler};
use crate::logic::submission::{SubmissionBuilder, SubmissionTransport};
use crate::model::{
    AttributeGroup, ClientIndex, LocalFile, RemoteVariant, RowEdit, SelectionState,
    SubmissionPayload, VariantRow,
};

/// Lifecycle of an editing session.
///
/// `Hydrating` seeds selection and rows from the backend without generating
/// anything; `Interactive` regenerates and reconciles on every selection
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Hydrating,
    Interactive,
}

impl SessionPhase {
    fn describe(self) -> &'static str {
        match self {
            SessionPhase::Hydrating => "hydrating",
            SessionPhase::Interactive => "interactive",
        }
    }
}

/// Raised when the current selection is over the combination cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapViolation {
    pub total: usize,
    pub cap: usize,
}

/// Result of seeding rows from a backend row set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedVariant>,
}

impl HydrationReport {
    fn from_set(set: &HydratedSet) -> Self {
        Self {
            loaded: set.rows.len(),
            skipped: set.skipped.clone(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub selection: SelectionState,
    pub rows: Vec<VariantRow>,
    pub combination_cap: usize,
    pub cap_exceeded: Option<CapViolation>,
    pub removed_image_paths: Vec<String>,
    pub submitting: bool,
}

/// One operator's editing session over a product's variant matrix
#[derive(Debug)]
pub struct VariantSession {
    groups: Vec<AttributeGroup>,
    config: MatrixConfig,
    phase: SessionPhase,
    selection: SelectionState,
    rows: Vec<VariantRow>,
    stager: ImageStager,
    allocator: ClientIndexAllocator,
    cap_violation: Option<CapViolation>,
    submitting: bool,
}

impl VariantSession {
    pub fn new(groups: Vec<AttributeGroup>, config: MatrixConfig) -> Self {
        Self {
            groups,
            config,
            phase: SessionPhase::Interactive,
            selection: SelectionState::new(),
            rows: Vec::new(),
            stager: ImageStager::new(),
            allocator: ClientIndexAllocator::new(),
            cap_violation: None,
            submitting: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn groups(&self) -> &[AttributeGroup] {
        &self.groups
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn rows(&self) -> &[VariantRow] {
        &self.rows
    }

    pub fn row(&self, client_index: ClientIndex) -> Option<&VariantRow> {
        self.rows.iter().find(|r| r.client_index == client_index)
    }

    pub fn row_by_key(&self, key: &str) -> Option<&VariantRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn combination_cap(&self) -> usize {
        self.config.combination_cap
    }

    pub fn cap_violation(&self) -> Option<CapViolation> {
        self.cap_violation
    }

    pub fn removed_image_paths(&self) -> &[String] {
        self.stager.removed_paths()
    }

    pub fn live_previews(&self) -> usize {
        self.stager.previews().live_count()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            selection: self.selection.clone(),
            rows: self.rows.clone(),
            combination_cap: self.config.combination_cap,
            cap_exceeded: self.cap_violation,
            removed_image_paths: self.stager.removed_paths().to_vec(),
            submitting: self.submitting,
        }
    }

    // ---------------------------------------------------------------------
    // Hydration
    // ---------------------------------------------------------------------

    pub fn begin_hydration(&mut self) -> MatrixResult<()> {
        self.ensure_idle()?;
        self.phase = SessionPhase::Hydrating;
        Ok(())
    }

    /// Replace selection and rows with a backend row set. Only valid while
    /// hydrating, so the selection change does not trigger regeneration.
    pub fn seed(&mut self, variants: &[RemoteVariant]) -> MatrixResult<HydrationReport> {
        if self.phase != SessionPhase::Hydrating {
            return Err(MatrixError::InvalidPhase(self.phase.describe()));
        }
        let set = Hydrator::load(&self.groups, variants, &self.rows, &mut self.allocator);
        let report = HydrationReport::from_set(&set);
        self.install(set);
        self.stager.clear_removed();
        Ok(report)
    }

    pub fn finish_hydration(&mut self) {
        self.phase = SessionPhase::Interactive;
    }

    /// Seed from a previously persisted variant set in one step
    pub fn hydrate(&mut self, variants: &[RemoteVariant]) -> MatrixResult<HydrationReport> {
        self.begin_hydration()?;
        let report = self.seed(variants);
        self.finish_hydration();
        let report = report?;
        info!(
            "Session hydrated with {} rows across {} groups",
            report.loaded,
            self.selection.active_groups().count()
        );
        Ok(report)
    }

    fn install(&mut self, set: HydratedSet) {
        for row in &self.rows {
            self.stager.release_row(row);
        }
        self.rows = set.rows;
        self.selection = set.selection;
        self.cap_violation = None;
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Flip one option value; returns whether it is selected afterwards
    pub fn toggle_option(&mut self, group_id: &str, value: &str) -> MatrixResult<bool> {
        self.ensure_group(group_id)?;
        self.ensure_idle()?;
        let selected = self.selection.toggle(group_id, value);
        self.selection_changed()?;
        Ok(selected)
    }

    pub fn set_group_selection<I, V>(&mut self, group_id: &str, values: I) -> MatrixResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.ensure_group(group_id)?;
        self.ensure_idle()?;
        self.selection.set_group(group_id, values);
        self.selection_changed()
    }

    pub fn clear_group(&mut self, group_id: &str) -> MatrixResult<()> {
        self.ensure_group(group_id)?;
        self.ensure_idle()?;
        self.selection.clear_group(group_id);
        self.selection_changed()
    }

    pub fn replace_selection(&mut self, selection: SelectionState) -> MatrixResult<()> {
        for (group_id, _) in selection.active_groups() {
            self.ensure_group(group_id)?;
        }
        self.ensure_idle()?;
        self.selection = selection;
        self.selection_changed()
    }

    fn selection_changed(&mut self) -> MatrixResult<()> {
        match self.phase {
            SessionPhase::Hydrating => Ok(()),
            SessionPhase::Interactive => self.recompute(),
        }
    }

    /// Generate from the current selection and reconcile against the rows
    /// held now. Over the cap, rows stay exactly as they were.
    fn recompute(&mut self) -> MatrixResult<()> {
        let drafts = match CombinationGenerator::generate(
            &self.groups,
            &self.selection,
            self.config.combination_cap,
        ) {
            Ok(drafts) => drafts,
            Err(MatrixError::CapExceeded { total, cap }) => {
                self.cap_violation = Some(CapViolation { total, cap });
                return Err(MatrixError::CapExceeded { total, cap });
            }
            Err(err) => return Err(err),
        };

        let outcome = RowReconciler::reconcile(&self.rows, drafts, &mut self.allocator);
        for row in &outcome.dropped {
            self.stager.release_row(row);
        }
        self.rows = outcome.rows;
        self.cap_violation = None;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Row edits and images
    // ---------------------------------------------------------------------

    pub fn update_row(&mut self, client_index: ClientIndex, edit: &RowEdit) -> MatrixResult<&VariantRow> {
        self.ensure_idle()?;
        let row = self.row_mut(client_index)?;
        row.apply_edit(edit);
        Ok(&*row)
    }

    /// Stage a local photo on a row; returns its preview handle
    pub fn attach_image(&mut self, client_index: ClientIndex, file: LocalFile) -> MatrixResult<String> {
        self.ensure_idle()?;
        let position = self.position(client_index)?;
        Ok(self.stager.attach_local(&mut self.rows[position], file))
    }

    pub fn remove_image(&mut self, client_index: ClientIndex) -> MatrixResult<()> {
        self.ensure_idle()?;
        let position = self.position(client_index)?;
        self.stager.remove(&mut self.rows[position]);
        Ok(())
    }

    fn position(&self, client_index: ClientIndex) -> MatrixResult<usize> {
        self.rows
            .iter()
            .position(|r| r.client_index == client_index)
            .ok_or(MatrixError::RowNotFound(client_index))
    }

    fn row_mut(&mut self, client_index: ClientIndex) -> MatrixResult<&mut VariantRow> {
        self.rows
            .iter_mut()
            .find(|r| r.client_index == client_index)
            .ok_or(MatrixError::RowNotFound(client_index))
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    /// Build the payload for the whole row set and mark a submission in
    /// flight. Refused while the selection is over the cap.
    pub fn prepare_submission(&mut self) -> MatrixResult<SubmissionPayload> {
        self.ensure_idle()?;
        if self.phase != SessionPhase::Interactive {
            return Err(MatrixError::InvalidPhase(self.phase.describe()));
        }
        if let Some(CapViolation { total, cap }) = self.cap_violation {
            return Err(MatrixError::CapExceeded { total, cap });
        }
        let builder = SubmissionBuilder::new(self.config.image_field_prefix.clone());
        let payload = builder.build(&self.rows, self.stager.removed_paths());
        self.submitting = true;
        Ok(payload)
    }

    /// Finish the in-flight submission. On success the response becomes the
    /// row set; on failure nothing local changes.
    pub fn complete_submission(
        &mut self,
        outcome: Result<Vec<RemoteVariant>, String>,
    ) -> MatrixResult<HydrationReport> {
        if !self.submitting {
            return Err(MatrixError::NoSubmissionInFlight);
        }
        self.submitting = false;
        match outcome {
            Ok(variants) => {
                let report = self.ingest(&variants);
                self.stager.clear_removed();
                Ok(report)
            }
            Err(message) => {
                warn!("Variant submission failed: {}", message);
                Err(MatrixError::Submission(message))
            }
        }
    }

    pub async fn submit(&mut self, transport: &dyn SubmissionTransport) -> MatrixResult<HydrationReport> {
        let payload = self.prepare_submission()?;
        let outcome = transport
            .submit(&payload)
            .await
            .map_err(|e| e.to_string());
        self.complete_submission(outcome)
    }

    /// Re-seed from the backend's response through the same hydration path,
    /// keeping client indices of rows the response does not index itself
    fn ingest(&mut self, variants: &[RemoteVariant]) -> HydrationReport {
        self.phase = SessionPhase::Hydrating;
        let set = Hydrator::load(&self.groups, variants, &self.rows, &mut self.allocator);
        let report = HydrationReport::from_set(&set);
        self.install(set);
        self.phase = SessionPhase::Interactive;
        info!("Ingested {} rows from submission response", report.loaded);
        report
    }

    // ---------------------------------------------------------------------

    /// Release every outstanding preview handle
    pub fn close(&mut self) {
        self.stager.release_all();
    }

    fn ensure_idle(&self) -> MatrixResult<()> {
        if self.submitting {
            Err(MatrixError::SubmissionInFlight)
        } else {
            Ok(())
        }
    }

    fn ensure_group(&self, group_id: &str) -> MatrixResult<()> {
        if self.groups.iter().any(|g| g.id == group_id) || self.selection.values(group_id).is_some() {
            Ok(())
        } else {
            Err(MatrixError::UnknownGroup(group_id.to_string()))
        }
    }
}

impl Drop for VariantSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeOption, ImageRef, RemotePart, RemoteScalar};

    fn catalog() -> Vec<AttributeGroup> {
        vec![
            AttributeGroup::new(
                "Color",
                "Color",
                vec![AttributeOption::new("Red", "Red"), AttributeOption::new("Blue", "Blue")],
            ),
            AttributeGroup::new(
                "Size",
                "Size",
                vec![AttributeOption::new("S", "Small"), AttributeOption::new("M", "Medium")],
            ),
        ]
    }

    fn session(cap: usize) -> VariantSession {
        VariantSession::new(
            catalog(),
            MatrixConfig {
                combination_cap: cap,
                ..MatrixConfig::default()
            },
        )
    }

    fn remote(color: &str, size: &str, sku: &str, id: i64) -> RemoteVariant {
        RemoteVariant {
            id: Some(RemoteScalar::from(id)),
            parts: vec![RemotePart::new("Color", color), RemotePart::new("Size", size)],
            sku: Some(sku.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_selection_change_regenerates_rows() {
        let mut session = session(200);
        session.set_group_selection("Color", ["Red", "Blue"]).unwrap();
        assert_eq!(session.rows().len(), 2);
        session.set_group_selection("Size", ["S", "M"]).unwrap();
        assert_eq!(session.rows().len(), 4);
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let mut session = session(200);
        let err = session.toggle_option("Material", "Wool").unwrap_err();
        assert_eq!(err, MatrixError::UnknownGroup("Material".to_string()));
    }

    #[test]
    fn test_hydration_does_not_regenerate() {
        let mut session = session(200);
        session.begin_hydration().unwrap();
        assert_eq!(session.phase(), SessionPhase::Hydrating);

        // selection changes while hydrating are recorded but generate nothing
        session.toggle_option("Color", "Red").unwrap();
        assert!(session.rows().is_empty());

        let report = session
            .seed(&[remote("Red", "S", "RED-S", 1), remote("Blue", "M", "BLUE-M", 2)])
            .unwrap();
        session.finish_hydration();

        assert_eq!(report.loaded, 2);
        assert_eq!(session.phase(), SessionPhase::Interactive);
        assert_eq!(session.row_by_key("Color:Red|Size:S").map(|r| r.sku.as_str()), Some("RED-S"));
        assert!(session.selection().is_selected("Color", "Blue"));
        assert!(session.selection().is_selected("Size", "M"));
    }

    #[test]
    fn test_seed_outside_hydration_is_rejected() {
        let mut session = session(200);
        let err = session.seed(&[remote("Red", "S", "X", 1)]).unwrap_err();
        assert_eq!(err, MatrixError::InvalidPhase("interactive"));
    }

    #[test]
    fn test_rehydrate_never_hands_out_an_issued_index() {
        let mut session = session(200);
        session.set_group_selection("Color", ["Red", "Blue"]).unwrap();
        session.set_group_selection("Size", ["S"]).unwrap();
        let red_s = session.row_by_key("Color:Red|Size:S").unwrap().client_index;
        let blue_s = session.row_by_key("Color:Blue|Size:S").unwrap().client_index;
        session.set_group_selection("Color", ["Red"]).unwrap();

        let mut stale = remote("Blue", "M", "BLUE-M", 2);
        stale.client_index = Some(blue_s);
        session
            .hydrate(&[remote("Red", "S", "RED-S", 1), stale])
            .unwrap();

        assert_eq!(session.row_by_key("Color:Red|Size:S").map(|r| r.client_index), Some(red_s));
        let blue_m = session.row_by_key("Color:Blue|Size:M").unwrap().client_index;
        assert_ne!(blue_m, blue_s);
        assert!(blue_m > red_s.max(blue_s));
    }

    #[test]
    fn test_hydrated_rows_survive_first_regeneration() {
        let mut session = session(200);
        session
            .hydrate(&[remote("Red", "S", "RED-S", 1), remote("Blue", "M", "BLUE-M", 2)])
            .unwrap();

        // union selection is Color{Red,Blue} x Size{S,M}: two new rows appear
        session.set_group_selection("Size", ["S", "M"]).unwrap();
        assert_eq!(session.rows().len(), 4);
        let red_s = session.row_by_key("Color:Red|Size:S").unwrap();
        assert_eq!(red_s.sku, "RED-S");
        assert_eq!(red_s.server_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_cap_exceeded_keeps_rows_and_blocks_submission() {
        let mut session = session(3);
        session.set_group_selection("Color", ["Red", "Blue"]).unwrap();
        let before = session.rows().to_vec();

        let err = session.set_group_selection("Size", ["S", "M"]).unwrap_err();
        assert!(err.is_cap_exceeded());
        assert_eq!(session.rows(), before.as_slice());
        assert_eq!(session.cap_violation(), Some(CapViolation { total: 4, cap: 3 }));
        assert!(session.prepare_submission().unwrap_err().is_cap_exceeded());

        // back under the cap clears the flag
        session.set_group_selection("Size", ["S"]).unwrap();
        assert_eq!(session.cap_violation(), None);
        assert_eq!(session.rows().len(), 2);
    }

    #[test]
    fn test_dropped_rows_release_previews() {
        let mut session = session(200);
        session.set_group_selection("Color", ["Red", "Blue"]).unwrap();
        let blue = session.row_by_key("Color:Blue").unwrap().client_index;
        session
            .attach_image(blue, LocalFile::new("blue.jpg", "image/jpeg", vec![1]))
            .unwrap();
        assert_eq!(session.live_previews(), 1);

        session.toggle_option("Color", "Blue").unwrap();
        assert_eq!(session.rows().len(), 1);
        assert_eq!(session.live_previews(), 0);
    }

    #[test]
    fn test_edits_blocked_while_submitting() {
        let mut session = session(200);
        session.set_group_selection("Color", ["Red"]).unwrap();
        let index = session.rows()[0].client_index;

        session.prepare_submission().unwrap();
        assert_eq!(session.prepare_submission().unwrap_err(), MatrixError::SubmissionInFlight);
        assert_eq!(
            session.update_row(index, &RowEdit::default()).unwrap_err(),
            MatrixError::SubmissionInFlight
        );
    }

    #[test]
    fn test_failed_submission_leaves_state_untouched() {
        let mut session = session(200);
        session
            .hydrate(&[RemoteVariant {
                image: Some(crate::model::RemoteImage::Path("variants/1.jpg".to_string())),
                ..remote("Red", "S", "RED-S", 1)
            }])
            .unwrap();
        let index = session.rows()[0].client_index;
        session.remove_image(index).unwrap();
        session
            .update_row(
                index,
                &RowEdit {
                    sku: Some("RED-S-2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let before = session.rows().to_vec();

        session.prepare_submission().unwrap();
        let err = session
            .complete_submission(Err("502 Bad Gateway".to_string()))
            .unwrap_err();
        assert_eq!(err, MatrixError::Submission("502 Bad Gateway".to_string()));
        assert!(!session.is_submitting());
        assert_eq!(session.rows(), before.as_slice());
        assert_eq!(session.removed_image_paths(), ["variants/1.jpg".to_string()]);
    }

    #[test]
    fn test_successful_submission_ingests_response() {
        let mut session = session(200);
        session.set_group_selection("Color", ["Red"]).unwrap();
        let index = session.rows()[0].client_index;
        session
            .attach_image(index, LocalFile::new("red.jpg", "image/jpeg", vec![1, 2]))
            .unwrap();

        let payload = session.prepare_submission().unwrap();
        assert_eq!(payload.attachments.len(), 1);

        let response = vec![RemoteVariant {
            id: Some(RemoteScalar::from("v-100")),
            parts: vec![RemotePart::new("Color", "Red")],
            image: Some(crate::model::RemoteImage::Object {
                url: Some("https://cdn.example/red.jpg".to_string()),
                path: Some("variants/red.jpg".to_string()),
            }),
            ..Default::default()
        }];
        let report = session.complete_submission(Ok(response)).unwrap();

        assert_eq!(report.loaded, 1);
        let row = &session.rows()[0];
        assert_eq!(row.client_index, index);
        assert_eq!(row.server_id.as_deref(), Some("v-100"));
        assert!(matches!(row.image, Some(ImageRef::Stored { .. })));
        assert_eq!(session.live_previews(), 0);
        assert_eq!(session.phase(), SessionPhase::Interactive);
    }

    #[test]
    fn test_complete_without_prepare_is_rejected() {
        let mut session = session(200);
        assert_eq!(
            session.complete_submission(Ok(Vec::new())).unwrap_err(),
            MatrixError::NoSubmissionInFlight
        );
    }
}
