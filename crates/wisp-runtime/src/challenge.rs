//! Skill challenges.
//!
//! A subject passes `{Skill, Level}` iff its practical value for that
//! skill is at least `Level`; a missing skill counts as zero. The same
//! rule gates three things:
//!
//! | Use | Failing means |
//! |-----|---------------|
//! | Description challenges | the object is left out of `look`/`scan` |
//! | Exit `UseChallenges` | the move is blocked |
//! | Emit challenges | the message is silently dropped |

use wisp_script::ObjectView;
use wisp_types::{Challenge, Description, Object};

#[must_use]
pub fn passes(subject: &Object, challenge: &Challenge) -> bool {
    subject.practical(&challenge.skill) >= challenge.level
}

#[must_use]
pub fn passes_all(subject: &Object, challenges: &[Challenge]) -> bool {
    challenges.iter().all(|c| passes(subject, c))
}

/// The first challenge `subject` fails, if any.
#[must_use]
pub fn first_failure<'a>(subject: &Object, challenges: &'a [Challenge]) -> Option<&'a Challenge> {
    challenges.iter().find(|c| !passes(subject, c))
}

/// The first description of `descriptions` whose challenges `viewer` passes.
#[must_use]
pub fn visible_description<'a>(
    descriptions: &'a [Description],
    viewer: &Object,
) -> Option<&'a Description> {
    descriptions
        .iter()
        .find(|d| passes_all(viewer, &d.challenges))
}

/// Whether `viewer` can perceive `object` at all.
///
/// An object without descriptions is always visible.
#[must_use]
pub fn is_visible(object: &Object, viewer: &Object) -> bool {
    object.descriptions.is_empty() || visible_description(&object.descriptions, viewer).is_some()
}

/// `object` as `viewer` sees it, or `None` when hidden.
#[must_use]
pub fn view(object: &Object, viewer: &Object) -> Option<ObjectView> {
    if object.descriptions.is_empty() {
        return Some(ObjectView {
            id: object.id.clone(),
            short: object.id.to_string(),
            long: String::new(),
        });
    }
    visible_description(&object.descriptions, viewer).map(|d| ObjectView {
        id: object.id.clone(),
        short: d.short.clone(),
        long: d.long.clone(),
    })
}

/// Display name of `object` for `viewer`, falling back to the id.
#[must_use]
pub fn name_for(object: &Object, viewer: &Object) -> String {
    view(object, viewer).map_or_else(|| object.id.to_string(), |v| v.short)
}
