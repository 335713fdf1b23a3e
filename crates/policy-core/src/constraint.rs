//! Comparison of required values against the values found in the object.
//!
//! A constraint applies only when the settings specify the field. When they
//! do, the value of the candidate can match, conflict, or be missing. A
//! missing value is not a violation: it is something a patch can fix.

/// Outcome of the comparison of a single field
#[derive(Debug, PartialEq, Eq)]
pub enum FieldStatus<'a, V: ?Sized> {
    /// The settings do not constrain the field
    Unconstrained,
    /// The candidate has the required value
    Satisfied,
    /// The candidate does not set the field
    Missing { required: &'a V },
    /// The candidate sets the field to a different value
    Conflict { required: &'a V, actual: &'a V },
}

pub fn compare<'a, V>(required: Option<&'a V>, actual: Option<&'a V>) -> FieldStatus<'a, V>
where
    V: PartialEq + ?Sized,
{
    match (required, actual) {
        (None, _) => FieldStatus::Unconstrained,
        (Some(required), None) => FieldStatus::Missing { required },
        (Some(required), Some(actual)) if required == actual => FieldStatus::Satisfied,
        (Some(required), Some(actual)) => FieldStatus::Conflict { required, actual },
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Conflict<'a, V: ?Sized> {
    pub field: &'static str,
    pub required: &'a V,
    pub actual: &'a V,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Missing<'a, V: ?Sized> {
    pub field: &'static str,
    pub required: &'a V,
}

/// Result of comparing a group of named fields, e.g. the four
/// SELinux options.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldReport<'a, V: ?Sized> {
    pub conflicts: Vec<Conflict<'a, V>>,
    pub missing: Vec<Missing<'a, V>>,
}

impl<'a, V> FieldReport<'a, V>
where
    V: PartialEq + ?Sized,
{
    /// Compare every `(field, required, actual)` triple. The order of the
    /// input is preserved in the report.
    pub fn check<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Option<&'a V>, Option<&'a V>)>,
    {
        let mut report = FieldReport {
            conflicts: Vec::new(),
            missing: Vec::new(),
        };

        for (field, required, actual) in fields {
            match compare(required, actual) {
                FieldStatus::Unconstrained | FieldStatus::Satisfied => {}
                FieldStatus::Missing { required } => {
                    report.missing.push(Missing { field, required })
                }
                FieldStatus::Conflict { required, actual } => report.conflicts.push(Conflict {
                    field,
                    required,
                    actual,
                }),
            }
        }

        report
    }
}
