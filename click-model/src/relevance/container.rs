use std::{collections::BTreeMap, fmt};

use log::warn;
use ndarray::{arr1, Array1};
use serde::{Deserialize, Serialize};

/// A relevance grade assigned by one rater together with the trust in that rater.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub grade: usize,
    pub trust: f64,
}

impl Rating {
    pub fn new(grade: usize, trust: f64) -> Self {
        Self { grade, trust }
    }
}

/// The relevance aspect a rating was collected for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Aspect {
    /// Direct relevance of the snippet itself.
    D,
    /// Relevance of the result document.
    R,
}

impl Aspect {
    /// Number of distinct grades of the aspect.
    pub fn grades(self) -> usize {
        match self {
            Aspect::D => RelContainer::GRADES_D,
            Aspect::R => RelContainer::GRADES_R,
        }
    }

    /// Distribution of grades assumed for items without ratings.
    pub fn prior(self) -> Array1<f64> {
        match self {
            Aspect::D => arr1(&[0.5, 0.3, 0.2]),
            Aspect::R => arr1(&[0.1, 0.1, 0.3, 0.5]),
        }
    }
}

/// All ratings assigned by the crowd workers to one query-document pair.
///
/// Raters disagree, so every aspect keeps the full list of ratings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelContainer {
    pub ds: Vec<Rating>,
    pub rs: Vec<Rating>,
}

impl RelContainer {
    /// Direct relevance grades: 0, 1, 2.
    pub const GRADES_D: usize = 3;
    /// Result relevance grades: 0, 1, 2, 3.
    pub const GRADES_R: usize = 4;

    pub fn ratings(&self, aspect: Aspect) -> &[Rating] {
        match aspect {
            Aspect::D => &self.ds,
            Aspect::R => &self.rs,
        }
    }

    /// Adds the rating if the grade string decodes to a valid grade of the aspect.
    pub fn add_rating(&mut self, aspect: Aspect, encoded: &str, trust: f64) {
        let grade = match parse_relevance_rating(encoded, 1) {
            Some(grade) if grade < aspect.grades() => grade,
            Some(_) => {
                warn!("Relevance grade out of range for {:?}: {}", aspect, encoded);
                return;
            }
            None => return,
        };
        match aspect {
            Aspect::D => self.ds.push(Rating::new(grade, trust)),
            Aspect::R => self.rs.push(Rating::new(grade, trust)),
        }
    }

    /// True if the pair got both a direct and a result relevance rating.
    pub fn is_complete(&self) -> bool {
        !self.ds.is_empty() && !self.rs.is_empty()
    }
}

impl fmt::Display for RelContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grades = |ratings: &[Rating]| {
            ratings
                .iter()
                .map(|rating| rating.grade.to_string())
                .collect::<String>()
        };
        write!(f, "Rel(D={}, R={})", grades(&self.ds), grades(&self.rs))
    }
}

/// Decodes a grade string like `R3` or `D-1` by skipping `offset` leading characters.
///
/// Negative grades encode answers like "can't judge" and yield `None`, as do malformed strings.
pub fn parse_relevance_rating(rel: &str, offset: usize) -> Option<usize> {
    if rel.is_empty() {
        return None;
    }
    let grade = rel
        .char_indices()
        .nth(offset)
        .map_or("", |(idx, _)| &rel[idx..]);
    match grade.parse::<i64>() {
        Ok(grade) if grade >= 0 => Some(grade as usize),
        Ok(_) => None,
        Err(_) => {
            warn!("Incorrect relevance: {}", rel);
            None
        }
    }
}

/// Converts the ratings into a probability distribution over the grades of the `aspect`.
///
/// Ratings are weighted by trust. An empty list (or one without any trusted rating in the range
/// of the aspect) yields the prior of the aspect. With `trec_style` only the most common grade is
/// considered.
pub fn rel_dist(ratings: &[Rating], aspect: Aspect, trec_style: bool) -> Array1<f64> {
    let mut row = Array1::zeros(aspect.grades());
    if trec_style {
        if let Some(cell) = row.get_mut(rel_most_common(ratings)) {
            *cell = 1.;
        }
        return row;
    }
    for rating in ratings {
        if let Some(cell) = row.get_mut(rating.grade) {
            *cell += rating.trust;
        }
    }
    let total = row.sum();
    if total > 0. {
        row / total
    } else {
        aspect.prior()
    }
}

/// The most common grade assigned by the raters, ties go to the lowest grade.
pub fn rel_most_common(ratings: &[Rating]) -> usize {
    ratings
        .iter()
        .fold(BTreeMap::new(), |mut counts, rating| {
            *counts.entry(rating.grade).or_insert(0usize) += 1;
            counts
        })
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (grade, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((grade, count)),
        })
        .map_or(0, |(grade, _)| grade)
}

/// Unweighted mean grade, `0` without ratings.
pub fn rel_avg(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        0.
    } else {
        ratings.iter().map(|rating| rating.grade as f64).sum::<f64>() / ratings.len() as f64
    }
}
