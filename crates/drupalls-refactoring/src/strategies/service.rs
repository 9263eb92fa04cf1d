//! Services constructed by the container from a `*.services.yml` entry

use tracing::debug;

use crate::error::RegionKind;
use crate::types::CompanionStatus;

use super::companion::update_companion;
use super::source::SourceEditor;
use super::{
    constructor_blocker, is_degraded, plan_dependencies, StrategyContext, StrategyOutput,
};

pub(super) fn compute(ctx: &StrategyContext<'_>) -> StrategyOutput {
    let mut output = StrategyOutput::empty(CompanionStatus::NotApplicable);
    let map = ctx.map;

    if !map.has_class_body() || is_degraded(map, RegionKind::Constructor) {
        debug!("Class structure is incomplete, no edits computed");
        return output;
    }

    let planned = plan_dependencies(ctx, false, &mut output.notes);

    let mut editor = SourceEditor::new(map, ctx.lines, ctx.config);
    let injections = editor.prepare(&planned);

    if !injections.is_empty() {
        // The companion must not gain arguments the class cannot take
        if let Some(note) = constructor_blocker(map) {
            output.notes.push(note);
            return output;
        }
        let mut members = editor.constructor_property_edits(&injections);
        match &map.constructor {
            Some(ctor) => members.extend(editor.constructor_edits(ctor, &injections)),
            None => members.extend(editor.synthesized_constructor(&[], &injections)),
        }
        output.edits.extend(editor.import_edits());
        output.edits.extend(members);
    }

    let service_ids: Vec<&str> = planned
        .iter()
        .map(|dependency| dependency.service_id.as_str())
        .collect();
    let companion = update_companion(ctx, &service_ids);
    output.edits.extend(companion.edits);
    output.notes.extend(companion.notes);
    output.companion = companion.status;

    debug!(
        dependencies = injections.len(),
        edits = output.edits.len(),
        "Computed service injection edits"
    );
    output
}
