//! Antipodal pair scoring and selection.

use geograsp_core::{
    AxisModel, Error, GraspConfiguration, GraspPoint, PlaneModel, PointCloud, Result,
};
use nalgebra::Point3;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Normals shorter than this carry no direction. Matches the length under
/// which averaged voxel normals are zeroed.
const NORMAL_EPS: f32 = geograsp_point_cloud::MIN_MEAN_NORMAL_LENGTH;
/// Openings at or below this are coincident contacts.
const WIDTH_EPS: f32 = 1e-6;

/// Relative weight of each score term. The default weights sum to one, so
/// scores lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    /// How close `n1 · n2` is to -1.
    pub alignment: f32,
    /// How close the opening is to the target width.
    pub width: f32,
    /// How close the contacts stay to their seeds.
    pub seed_proximity: f32,
    /// How close the contact midpoint stays to the grasp plane and the
    /// object axis.
    pub centering: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            alignment: 0.4,
            width: 0.2,
            seed_proximity: 0.2,
            centering: 0.2,
        }
    }
}

/// The grasp plane and the object axis it cuts. A well centred grasp closes
/// on the plane with its midpoint on the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspFrame {
    pub plane: PlaneModel,
    pub axis: AxisModel,
}

impl GraspFrame {
    pub fn new(plane: PlaneModel, axis: AxisModel) -> Self {
        Self { plane, axis }
    }

    /// Distance from the grasp plane plus distance from the axis.
    pub fn offset(&self, point: &Point3<f32>) -> f32 {
        self.plane.distance(point) + self.axis.distance(point)
    }
}

#[derive(Debug, Clone)]
pub struct GraspRanker {
    pub weights: RankingWeights,
    pub grip_tip_size: f32,
    pub target_width_ratio: f32,
    pub min_opposition: f32,
    /// Distance from a seed at which the proximity term reaches zero.
    pub seed_radius: f32,
}

/// Best grasps, highest score first, with their scores at the same index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedGrasps {
    pub grasps: Vec<GraspConfiguration>,
    pub rankings: Vec<f32>,
    pub requested: usize,
    /// Fewer valid pairs than requested were found.
    pub partial: bool,
}

impl RankedGrasps {
    pub fn len(&self) -> usize {
        self.grasps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grasps.is_empty()
    }
}

/// Pair index, score and grasp.
type Candidate = (usize, f32, GraspConfiguration);

/// Higher score first, then lower pair index.
fn by_rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Keep only the `count` best candidates, in no particular order.
fn keep_best(candidates: &mut Vec<Candidate>, count: usize) {
    if candidates.len() > count {
        candidates.select_nth_unstable_by(count - 1, by_rank);
        candidates.truncate(count);
    }
}

impl GraspRanker {
    pub fn new(grip_tip_size: f32, seed_radius: f32) -> Self {
        Self {
            weights: RankingWeights::default(),
            grip_tip_size,
            target_width_ratio: 0.5,
            min_opposition: 0.5,
            seed_radius,
        }
    }

    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_target_width_ratio(mut self, ratio: f32) -> Self {
        self.target_width_ratio = ratio;
        self
    }

    pub fn with_min_opposition(mut self, min_opposition: f32) -> Self {
        self.min_opposition = min_opposition;
        self
    }

    /// Score of the pair, or `None` when it cannot be grasped.
    ///
    /// The centering term reaches zero once the midpoint is a full grip
    /// tip size away from the frame.
    pub fn score(
        &self,
        first: &GraspPoint,
        second: &GraspPoint,
        first_seed: &GraspPoint,
        second_seed: &GraspPoint,
        frame: &GraspFrame,
    ) -> Option<f32> {
        let width = first.distance(second);
        if width <= WIDTH_EPS || width > self.grip_tip_size {
            return None;
        }
        let n1 = first.normal.try_normalize(NORMAL_EPS)?;
        let n2 = second.normal.try_normalize(NORMAL_EPS)?;
        let opposition = n1.dot(&n2);
        if opposition > -self.min_opposition {
            return None;
        }

        let alignment = (1.0 - opposition) / 2.0;

        let target = self.target_width_ratio * self.grip_tip_size;
        let width_fit = (1.0 - (width - target).abs() / self.grip_tip_size).max(0.0);

        let drift = first.distance(first_seed) + second.distance(second_seed);
        let proximity = (1.0 - drift / (2.0 * self.seed_radius)).max(0.0);

        let midpoint = nalgebra::center(&first.position, &second.position);
        let centering = (1.0 - frame.offset(&midpoint) / self.grip_tip_size).max(0.0);

        let w = &self.weights;
        Some(
            w.alignment * alignment
                + w.width * width_fit
                + w.seed_proximity * proximity
                + w.centering * centering,
        )
    }

    /// Score every pair of `first_region × second_region` and keep the best
    /// `count`. Both regions must carry normals.
    ///
    /// Each worker keeps at most `2 * count` candidates, so memory does not
    /// grow with the number of pairs. Ties keep enumeration order (first
    /// region major). Returning fewer than `count` grasps is not an error:
    /// the result is flagged `partial`.
    pub fn rank(
        &self,
        first_seed: &GraspPoint,
        second_seed: &GraspPoint,
        frame: &GraspFrame,
        first_region: &PointCloud,
        second_region: &PointCloud,
        count: usize,
    ) -> Result<RankedGrasps> {
        if count == 0 {
            return Err(Error::invalid_input("number of grasps must be >= 1"));
        }
        if !(self.grip_tip_size > 0.0) {
            return Err(Error::invalid_input(format!(
                "grip tip size must be positive, got {}",
                self.grip_tip_size
            )));
        }
        if !(self.seed_radius > 0.0) {
            return Err(Error::invalid_input("seed radius must be positive"));
        }
        let first = contacts(first_region)?;
        let second = contacts(second_region)?;

        let n2 = second.len();
        let budget = count.saturating_mul(2);
        let (valid, mut candidates) = first
            .par_iter()
            .enumerate()
            .fold(
                || (0usize, Vec::<Candidate>::new()),
                |(mut valid, mut best), (i, p1)| {
                    for (j, p2) in second.iter().enumerate() {
                        if let Some(s) = self.score(p1, p2, first_seed, second_seed, frame) {
                            valid += 1;
                            best.push((i * n2 + j, s, GraspConfiguration::new(*p1, *p2)));
                            if best.len() >= budget {
                                keep_best(&mut best, count);
                            }
                        }
                    }
                    (valid, best)
                },
            )
            .reduce(
                || (0, Vec::new()),
                |(valid_a, mut a), (valid_b, b)| {
                    a.extend(b);
                    keep_best(&mut a, count);
                    (valid_a + valid_b, a)
                },
            );

        keep_best(&mut candidates, count);
        candidates.sort_by(by_rank);

        let partial = candidates.len() < count;
        if partial {
            warn!(requested = count, found = valid, "fewer valid grasps than requested");
        }
        debug!(
            pairs = first.len() * n2,
            valid,
            best = ?candidates.first().map(|c| c.1),
            "grasp pairs ranked"
        );

        let (rankings, grasps) = candidates.into_iter().map(|(_, s, g)| (s, g)).unzip();
        Ok(RankedGrasps {
            grasps,
            rankings,
            requested: count,
            partial,
        })
    }
}

fn contacts(region: &PointCloud) -> Result<Vec<GraspPoint>> {
    let normals = region
        .normals
        .as_ref()
        .ok_or_else(|| Error::invalid_input("grasp region has no normals"))?;
    Ok(region
        .points
        .iter()
        .zip(normals)
        .map(|(p, n)| GraspPoint::new(*p, *n))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn region(points: &[(f32, f32, f32)], normals: &[Vector3<f32>]) -> PointCloud {
        PointCloud::new(points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect())
            .with_normals(normals.to_vec())
            .unwrap()
    }

    fn seed(x: f32, n: Vector3<f32>) -> GraspPoint {
        GraspPoint::new(Point3::new(x, 0.0, 0.0), n)
    }

    /// Axis along y through `(x, 0, 0)`; the grasp plane is `y = 0`.
    fn frame(x: f32) -> GraspFrame {
        let centroid = Point3::new(x, 0.0, 0.0);
        GraspFrame::new(
            PlaneModel::from_point_normal(&centroid, &Vector3::y()).unwrap(),
            AxisModel::new(centroid, Vector3::y()).unwrap(),
        )
    }

    #[test]
    fn test_score_prefers_opposing_normals() {
        let ranker = GraspRanker::new(0.1, 0.01);
        let s1 = seed(0.0, -Vector3::x());
        let s2 = seed(0.05, Vector3::x());
        let f = frame(0.025);

        let perfect = ranker.score(&s1, &s2, &s1, &s2, &f).unwrap();
        assert!((perfect - 1.0).abs() < 1e-6);

        let tilted = GraspPoint::new(s2.position, Vector3::new(1.0, 0.5, 0.0));
        let worse = ranker.score(&s1, &tilted, &s1, &s2, &f).unwrap();
        assert!(worse < perfect);

        let same_side = GraspPoint::new(s2.position, -Vector3::x());
        assert!(ranker.score(&s1, &same_side, &s1, &s2, &f).is_none());
    }

    #[test]
    fn test_score_prefers_pairs_on_the_grasp_plane() {
        let ranker = GraspRanker::new(0.1, 0.01);
        let s1 = GraspPoint::new(Point3::new(0.0, 0.0025, 0.0), -Vector3::x());
        let s2 = GraspPoint::new(Point3::new(0.05, 0.0025, 0.0), Vector3::x());
        let f = frame(0.025);

        // Same width, opposition and seed drift; only the plane offset differs.
        let on_plane = (seed(0.0, -Vector3::x()), seed(0.05, Vector3::x()));
        let off_plane = (
            GraspPoint::new(Point3::new(0.0, 0.005, 0.0), -Vector3::x()),
            GraspPoint::new(Point3::new(0.05, 0.005, 0.0), Vector3::x()),
        );
        let a = ranker.score(&on_plane.0, &on_plane.1, &s1, &s2, &f).unwrap();
        let b = ranker.score(&off_plane.0, &off_plane.1, &s1, &s2, &f).unwrap();
        assert!((a - b - 0.2 * 0.005 / 0.1).abs() < 1e-5, "{a} vs {b}");
    }

    #[test]
    fn test_score_rejects_wide_and_degenerate_pairs() {
        let ranker = GraspRanker::new(0.1, 0.01);
        let f = frame(0.0);
        let s1 = seed(0.0, -Vector3::x());
        let far = seed(0.2, Vector3::x());
        assert!(ranker.score(&s1, &far, &s1, &far, &f).is_none());

        let flat = seed(0.05, Vector3::zeros());
        assert!(ranker.score(&s1, &flat, &s1, &flat, &f).is_none());
        assert!(ranker.score(&s1, &s1, &s1, &s1, &f).is_none());
    }

    #[test]
    fn test_score_rejects_cancelled_normals() {
        // What is left of two opposite faces averaged in one voxel.
        let ranker = GraspRanker::new(0.1, 0.01);
        let f = frame(0.025);
        let residue = seed(0.0, Vector3::new(0.0, 0.0002, 0.0));
        let other = seed(0.05, -Vector3::y());
        assert!(ranker.score(&residue, &other, &residue, &other, &f).is_none());

        let unit = seed(0.0, Vector3::y());
        assert!(ranker.score(&unit, &other, &unit, &other, &f).is_some());
    }

    #[test]
    fn test_single_valid_pair_is_partial() {
        let up = Vector3::z();
        let first = region(
            &[(0.0, 0.0, 0.0), (0.0, 0.01, 0.0), (0.0, 0.02, 0.0), (0.0, 0.03, 0.0)],
            &[-Vector3::x(), up, up, up],
        );
        let second = region(
            &[(0.05, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 0.01, 0.0), (1.0, 0.02, 0.0)],
            &[Vector3::x(), Vector3::x(), Vector3::x(), Vector3::x()],
        );
        let ranker = GraspRanker::new(0.1, 0.01);
        let ranked = ranker
            .rank(
                &seed(0.0, -Vector3::x()),
                &seed(0.05, Vector3::x()),
                &frame(0.025),
                &first,
                &second,
                3,
            )
            .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked.rankings.len(), 1);
        assert!(ranked.partial);
        assert_eq!(ranked.requested, 3);
        assert!((ranked.grasps[0].width() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_rank_sorted_and_truncated() {
        let ys = [0.0, 0.002, 0.004, 0.006, 0.008];
        let first_pts: Vec<_> = ys.iter().map(|&y| (0.0, y, 0.0)).collect();
        let second_pts: Vec<_> = ys.iter().map(|&y| (0.04, y, 0.0)).collect();
        let first = region(&first_pts, &[-Vector3::x(); 5]);
        let second = region(&second_pts, &[Vector3::x(); 5]);

        let ranker = GraspRanker::new(0.1, 0.01);
        let ranked = ranker
            .rank(
                &seed(0.0, -Vector3::x()),
                &seed(0.04, Vector3::x()),
                &frame(0.02),
                &first,
                &second,
                4,
            )
            .unwrap();

        assert_eq!(ranked.len(), 4);
        assert!(!ranked.partial);
        assert!(ranked.rankings.windows(2).all(|w| w[0] >= w[1]));
        // The pair on the seeds wins.
        assert_eq!(ranked.grasps[0].first.position, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(ranked.grasps[0].second.position, Point3::new(0.04, 0.0, 0.0));
        assert!(ranked.grasps.iter().all(|g| g.width() <= 0.1 + 1e-6));
    }

    #[test]
    fn test_rank_keeps_the_same_best_as_a_full_sort() {
        let mut first_pts = Vec::new();
        let mut second_pts = Vec::new();
        for i in 0..15 {
            for j in 0..15 {
                let (y, z) = (i as f32 * 0.001, j as f32 * 0.001);
                first_pts.push((0.0, y, z));
                second_pts.push((0.045, y, z));
            }
        }
        let first = region(&first_pts, &vec![-Vector3::x(); first_pts.len()]);
        let second = region(&second_pts, &vec![Vector3::x(); second_pts.len()]);
        let s1 = GraspPoint::new(Point3::new(0.0, 0.007, 0.007), -Vector3::x());
        let s2 = GraspPoint::new(Point3::new(0.045, 0.007, 0.007), Vector3::x());
        let f = frame(0.0225);

        let ranker = GraspRanker::new(0.1, 0.01);
        let ranked = ranker.rank(&s1, &s2, &f, &first, &second, 5).unwrap();

        let a = contacts(&first).unwrap();
        let b = contacts(&second).unwrap();
        let mut all: Vec<f32> = a
            .iter()
            .flat_map(|p1| b.iter().filter_map(|p2| ranker.score(p1, p2, &s1, &s2, &f)))
            .collect();
        all.sort_by(|x, y| y.total_cmp(x));

        assert_eq!(ranked.rankings, all[..5].to_vec());
    }

    #[test]
    fn test_nothing_fits_the_gripper() {
        let first = region(&[(0.0, 0.0, 0.0)], &[-Vector3::x()]);
        let second = region(&[(0.05, 0.0, 0.0)], &[Vector3::x()]);
        let ranked = GraspRanker::new(0.01, 0.01)
            .rank(
                &seed(0.0, -Vector3::x()),
                &seed(0.05, Vector3::x()),
                &frame(0.025),
                &first,
                &second,
                2,
            )
            .unwrap();
        assert!(ranked.is_empty());
        assert!(ranked.partial);
    }

    #[test]
    fn test_rank_invalid_arguments() {
        let first = region(&[(0.0, 0.0, 0.0)], &[-Vector3::x()]);
        let s = seed(0.0, Vector3::x());
        let f = frame(0.0);
        let ranker = GraspRanker::new(0.1, 0.01);
        assert!(matches!(
            ranker.rank(&s, &s, &f, &first, &first, 0),
            Err(Error::InvalidInput(_))
        ));
        assert!(GraspRanker::new(0.0, 0.01).rank(&s, &s, &f, &first, &first, 1).is_err());

        let bare = PointCloud::new(vec![Point3::origin()]);
        assert!(ranker.rank(&s, &s, &f, &bare, &first, 1).is_err());
    }
}
