//! Applying a member diff from a patch to the member list of an existing relation.
use crate::tags::DELETE_SENTINEL;
use crate::RelationMember;

/// Returns `members` with `diff` applied, `members` is not modified.
///
/// Diff entries are applied one at a time, in order, each to the result of the previous ones.
/// An entry first removes every member referencing the same element. Unless its role is
/// [`DELETE_SENTINEL`], the entry is then put back at the position of the first removed member,
/// or appended when the element was not a member yet. Members not mentioned in the diff keep
/// their relative order.
///
/// # Examples
/// ```
/// # use nz_osm_patch::{update_members, RelationMember};
/// let members = vec![
///     RelationMember::node(1, "stop"),
///     RelationMember::way(1, ""),
///     RelationMember::node(3, "stop"),
/// ];
///
/// let updated = update_members(&members, &[RelationMember::way(1, "platform")]);
/// assert_eq!(updated[1], RelationMember::way(1, "platform"));
/// ```
///
/// [`DELETE_SENTINEL`]: tags/constant.DELETE_SENTINEL.html
pub fn update_members(members: &[RelationMember], diff: &[RelationMember]) -> Vec<RelationMember> {
    let mut updated = members.to_vec();

    for entry in diff {
        let first = updated.iter().position(|m| m.same_element(entry));
        updated.retain(|m| !m.same_element(entry));

        if entry.role == DELETE_SENTINEL {
            continue;
        }

        match first {
            Some(index) => updated.insert(index, entry.clone()),
            None => updated.push(entry.clone()),
        }
    }

    updated
}
