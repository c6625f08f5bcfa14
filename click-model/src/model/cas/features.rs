use ndarray::{s, Array1};

use crate::{
    data::{log_item::LogItem, snippet::Snippet},
    error::Error,
    model::cas::config::CasConfig,
    relevance::{rel_dist, rel_most_common, Aspect, RelContainer, RelevanceSource},
};

/// Number of snippet class signatures, one examination feature each.
pub const NUM_CLASSES: usize = 10;
/// Column indicator, vertical offset, width, height and area.
pub const NUM_GEOMETRY_FEATURES: usize = 5;
/// Intercept, rank, classes and geometry.
pub const NUM_FEATURES_EPSILON: usize = 2 + NUM_CLASSES + NUM_GEOMETRY_FEATURES;
/// Intercept and the distribution over result relevance grades.
pub const NUM_FEATURES_ALPHA: usize = 1 + RelContainer::GRADES_R;
pub const NUM_TAU_D: usize = RelContainer::GRADES_D;
pub const NUM_TAU_R: usize = RelContainer::GRADES_R;

pub(crate) const RANK_FEATURE: usize = 1;
pub(crate) const CLASS_OFFSET: usize = 2;
pub(crate) const GEOMETRY_OFFSET: usize = CLASS_OFFSET + NUM_CLASSES;

// observed ranges of the snippet geometry in pixels
const MAX_OFFSET_TOP: f64 = 1869.;
const MIN_WIDTH: f64 = 338.;
const MAX_WIDTH: f64 = 539.;
const MIN_HEIGHT: f64 = 33.;
const MAX_HEIGHT: f64 = 896.;

/// Features of one log item of a SERP.
#[derive(Clone, Debug)]
pub(crate) struct ItemFeatures {
    /// Examination features.
    pub(crate) exam: Array1<f64>,
    /// Attraction features.
    pub(crate) attr: Array1<f64>,
    /// Direct relevance distribution, zero if direct relevance isn't used.
    pub(crate) d: Array1<f64>,
    /// Result relevance distribution.
    pub(crate) r: Array1<f64>,
    /// Most common direct relevance grade, zero if direct relevance isn't used.
    pub(crate) d_grade: usize,
    /// Most common result relevance grade.
    pub(crate) r_grade: usize,
}

fn exam_features(
    config: &CasConfig,
    rank: usize,
    snippet: &Snippet,
    second_column: bool,
) -> Result<Array1<f64>, Error> {
    let mut features = Array1::zeros(NUM_FEATURES_EPSILON);
    features[0] = 1.;
    features[RANK_FEATURE] = (1 + rank) as f64 / 10.;

    if config.trec_style() {
        return Ok(features);
    }
    if config.use_class() {
        features[CLASS_OFFSET + snippet.class_index()?] = 1.;
    }
    if config.use_geometry() {
        let layout = &snippet.layout;
        let width = layout.width as f64;
        let height = layout.height as f64;
        features[GEOMETRY_OFFSET] = if second_column { 1. } else { 0. };
        features[GEOMETRY_OFFSET + 1] = layout.offset_top as f64 / MAX_OFFSET_TOP;
        features[GEOMETRY_OFFSET + 2] = (width - MIN_WIDTH) / (MAX_WIDTH - MIN_WIDTH);
        features[GEOMETRY_OFFSET + 3] = (height - MIN_HEIGHT) / (MAX_HEIGHT - MIN_HEIGHT);
        features[GEOMETRY_OFFSET + 4] = (width * height - MIN_WIDTH * MIN_HEIGHT)
            / (MAX_WIDTH * MAX_HEIGHT - MIN_WIDTH * MIN_HEIGHT);
    }
    Ok(features)
}

/// Examination features of every snippet of the SERP.
///
/// Snippets are grouped into columns by their offset parent. The rank restarts at zero in the
/// second column.
pub(crate) fn serp_exam_features(
    config: &CasConfig,
    serp: &[Snippet],
) -> Result<Vec<Array1<f64>>, Error> {
    let mut parents = Vec::<&str>::with_capacity(2);
    let mut rank = 0;
    serp.iter()
        .map(|snippet| {
            let parent = snippet.layout.offset_parent.as_str();
            if !parents.contains(&parent) {
                if !parents.is_empty() {
                    rank = 0;
                }
                if parents.len() == 2 {
                    return Err(Error::TooManyColumns);
                }
                parents.push(parent);
            }
            let second_column = parents[0] != parent;
            let features = exam_features(config, rank, snippet, second_column)?;
            rank += 1;
            Ok(features)
        })
        .collect()
}

/// Attraction features of an item with the given result relevance ratings.
pub(crate) fn attr_features(rel: &RelContainer, trec_style: bool) -> Array1<f64> {
    let mut features = Array1::ones(NUM_FEATURES_ALPHA);
    features
        .slice_mut(s![1..])
        .assign(&rel_dist(&rel.rs, Aspect::R, trec_style));
    features
}

/// All features of the items of a session.
pub(crate) fn session_features(
    config: &CasConfig,
    relevance: &impl RelevanceSource,
    session: &[LogItem],
    serp: &[Snippet],
) -> Result<Vec<ItemFeatures>, Error> {
    let exam = serp_exam_features(config, serp)?;
    Ok(session
        .iter()
        .zip(exam)
        .map(|(item, exam)| {
            let rel = relevance.ratings(&item.id);
            let (d, d_grade) = if config.use_d() {
                (
                    rel_dist(&rel.ds, Aspect::D, config.trec_style()),
                    rel_most_common(&rel.ds),
                )
            } else {
                (Array1::zeros(NUM_TAU_D), 0)
            };
            ItemFeatures {
                exam,
                attr: attr_features(&rel, config.trec_style()),
                d,
                r: rel_dist(&rel.rs, Aspect::R, config.trec_style()),
                d_grade,
                r_grade: rel_most_common(&rel.rs),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use test_utils::assert_approx_eq;

    use super::*;
    use crate::{data::snippet::SNIPPET_CLASSES, relevance::Rating};

    fn snippet(classes: &[&str], layout: &str) -> Snippet {
        Snippet::new(classes.iter().copied(), layout.parse().unwrap())
    }

    #[test]
    fn test_number_of_classes() {
        assert_eq!(SNIPPET_CLASSES.len(), NUM_CLASSES);
        assert_eq!(NUM_FEATURES_EPSILON, 17);
        assert_eq!(NUM_FEATURES_ALPHA, 5);
    }

    #[test]
    fn test_exam_features() {
        let serp = [snippet(&["_oqc", "g"], "372;16;842;539;896")];
        let features = serp_exam_features(&CasConfig::default(), &serp).unwrap();

        let mut expected = [0.; NUM_FEATURES_EPSILON];
        expected[0] = 1.;
        expected[1] = 0.1;
        expected[3] = 1.;
        expected[13] = 842. / 1869.;
        expected[14] = 1.;
        expected[15] = 1.;
        expected[16] = 1.;
        assert_approx_eq!(f64, &features[0], expected);
    }

    #[test]
    fn test_features_can_be_disabled() {
        let serp = [snippet(&["g", "unknown"], "372;16;842;496;147")];
        let config = CasConfig::default().with_class(false).with_geometry(false);
        let features = serp_exam_features(&config, &serp).unwrap();
        assert_approx_eq!(f64, features[0].sum(), 1.1);

        let trec = CasConfig::default().with_trec_style(true);
        assert!(serp_exam_features(&trec, &serp).is_ok());
        assert!(matches!(
            serp_exam_features(&CasConfig::default(), &serp),
            Err(Error::UnknownSnippetClass(_))
        ));
    }

    #[test]
    fn test_rank_resets_in_second_column() {
        let serp = [
            snippet(&["g"], "1;0;0;400;100"),
            snippet(&["g"], "1;0;100;400;100"),
            snippet(&["g"], "2;0;0;400;100"),
            snippet(&["g"], "2;0;100;400;100"),
        ];
        let features = serp_exam_features(&CasConfig::default(), &serp).unwrap();
        let ranks = features
            .iter()
            .map(|f| f[RANK_FEATURE])
            .collect::<Vec<_>>();
        let columns = features
            .iter()
            .map(|f| f[GEOMETRY_OFFSET])
            .collect::<Vec<_>>();
        assert_approx_eq!(f64, ranks, [0.1, 0.2, 0.1, 0.2]);
        assert_approx_eq!(f64, columns, [0., 0., 1., 1.]);
    }

    #[test]
    fn test_too_many_columns() {
        let serp = [
            snippet(&["g"], "1;0;0;400;100"),
            snippet(&["g"], "2;0;0;400;100"),
            snippet(&["g"], "3;0;0;400;100"),
        ];
        assert!(matches!(
            serp_exam_features(&CasConfig::default(), &serp),
            Err(Error::TooManyColumns)
        ));
    }

    #[test]
    fn test_attr_features() {
        let rel = RelContainer {
            ds: Vec::new(),
            rs: vec![Rating::new(3, 1.), Rating::new(1, 1.)],
        };
        assert_approx_eq!(f64, attr_features(&rel, false), [1., 0., 0.5, 0., 0.5]);
        assert_approx_eq!(f64, attr_features(&rel, true), [1., 0., 1., 0., 0.]);
        assert_approx_eq!(
            f64,
            attr_features(&RelContainer::default(), false),
            [1., 0.1, 0.1, 0.3, 0.5]
        );
    }
}
