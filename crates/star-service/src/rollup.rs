//! Star totals per employee, summed from individual rating rows.

use itertools::Itertools;
use star_db::models::{Employee, RatingStars};
use std::collections::HashMap;
use uuid::Uuid;

pub struct RatedEmployee {
    pub employee: Employee,
    pub total_stars: i64,
}

/// Sums the stars of every rating into a bucket per employee. Ratings for
/// employees that are not displayed are harmless; they are simply never
/// looked up.
pub fn total_stars<I>(ratings: I) -> HashMap<Uuid, i64>
where
    I: IntoIterator<Item = RatingStars>,
{
    ratings
        .into_iter()
        .map(|rating| (rating.employee_id, i64::from(rating.stars)))
        .into_grouping_map()
        .sum()
}

/// Attaches each employee's total, zero when nobody has rated them yet.
/// Employee order is preserved.
pub fn attach_totals<I>(employees: Vec<Employee>, ratings: I) -> Vec<RatedEmployee>
where
    I: IntoIterator<Item = RatingStars>,
{
    let totals = total_stars(ratings);
    employees
        .into_iter()
        .map(|employee| RatedEmployee {
            total_stars: totals.get(&employee.id).copied().unwrap_or(0),
            employee,
        })
        .collect()
}
