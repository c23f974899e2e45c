use sqlx::{QueryBuilder, Sqlite};

pub mod expiry;
pub mod fares;
pub mod incidents;
pub mod insert;
pub mod timetable;

/// SQLite rejects statements with too many bound parameters; IN-list
/// queries run once per chunk of this size and concatenate.
pub(crate) const IN_LIST_MAX: usize = 500;

pub(crate) fn push_in_list<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    values: &'args [String],
) {
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
}
