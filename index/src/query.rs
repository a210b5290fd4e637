//! Read-only queries over the completed indices.
//!
//! All queries are total: an unknown series or instance UID yields an
//! empty result, never an error. Queries that take an optional series
//! UID fall back to the first series in insertion order when the
//! argument is omitted.

use crate::indexer::DatasetIndexer;

impl DatasetIndexer {
    /// Every series UID seen so far, in insertion order.
    pub fn series_uids(&self) -> Vec<String> {
        self.series_order().to_vec()
    }

    /// The file that carried the given instance, if known.
    pub fn file_for(&self, instance_uid: &str) -> Option<&str> {
        self.instance_file_map()
            .get(instance_uid)
            .map(String::as_str)
    }

    /// The series a given instance belongs to, if known.
    pub fn series_for(&self, instance_uid: &str) -> Option<&str> {
        self.instance_series_map()
            .get(instance_uid)
            .map(String::as_str)
    }

    fn resolve_series<'a>(&'a self, series_uid: Option<&'a str>) -> Option<&'a str> {
        series_uid.or_else(|| self.series_order().first().map(String::as_str))
    }

    /// Sorted (slice number, filename) pairs for the given series, or
    /// for the first series when omitted. Instances without a recorded
    /// slice number are left out. The sort is stable by number, then
    /// by filename.
    pub fn slice_number_pairs(&self, series_uid: Option<&str>) -> Vec<(i32, String)> {
        let mut pairs: Vec<(i32, String)> = self
            .instances_of(series_uid)
            .filter_map(|uid| {
                let number = self.ordering_map().get(uid)?.slice_number?;
                Some((number, self.filename_of(uid)))
            })
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        pairs
    }

    /// Sorted (slice location, filename) pairs for the given series,
    /// or for the first series when omitted. Instances without a
    /// recorded slice location are left out.
    pub fn slice_location_pairs(&self, series_uid: Option<&str>) -> Vec<(f32, String)> {
        let mut pairs: Vec<(f32, String)> = self
            .instances_of(series_uid)
            .filter_map(|uid| {
                let location = self.ordering_map().get(uid)?.slice_location?;
                Some((location, self.filename_of(uid)))
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        pairs
    }

    /// Sorted (projection, filename) pairs for the given series, or
    /// for the first series when omitted. Each instance's image
    /// position is projected onto the slice normal (the cross product
    /// of the row and column direction cosines); this ordering is the
    /// most reliable when slice numbers and locations are inconsistent
    /// across vendors. Instances missing either the position or the
    /// orientation are left out.
    pub fn image_position_pairs(&self, series_uid: Option<&str>) -> Vec<(f32, String)> {
        let mut pairs: Vec<(f32, String)> = self
            .instances_of(series_uid)
            .filter_map(|uid| {
                let record = self.ordering_map().get(uid)?;
                let position = record.position?;
                let o = record.orientation?;
                let normal = [
                    o[1] * o[5] - o[2] * o[4],
                    o[2] * o[3] - o[0] * o[5],
                    o[0] * o[4] - o[1] * o[3],
                ];
                let projection = normal[0] * position[0]
                    + normal[1] * position[1]
                    + normal[2] * position[2];
                Some((projection, self.filename_of(uid)))
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        pairs
    }

    /// The contours recorded for the given series, or for the first
    /// series when omitted. Each contour is a flat run of (x, y, z)
    /// coordinates.
    pub fn contours(&self, series_uid: Option<&str>) -> &[Vec<f32>] {
        self.resolve_series(series_uid)
            .and_then(|uid| self.series_map().get(uid))
            .map(|record| record.contours.as_slice())
            .unwrap_or(&[])
    }

    /// The referenced instance UIDs recorded for the given series, or
    /// for the first series when omitted. Position `k` pairs with
    /// contour `k` of [`DatasetIndexer::contours`].
    pub fn referenced_instances(&self, series_uid: Option<&str>) -> &[String] {
        self.resolve_series(series_uid)
            .and_then(|uid| self.series_map().get(uid))
            .map(|record| record.referenced_instances.as_slice())
            .unwrap_or(&[])
    }

    /// The instance UIDs of the given series in parse order, or of the
    /// first series when omitted.
    pub fn instances(&self, series_uid: Option<&str>) -> &[String] {
        self.resolve_series(series_uid)
            .and_then(|uid| self.series_map().get(uid))
            .map(|record| record.instances.as_slice())
            .unwrap_or(&[])
    }

    fn instances_of(&self, series_uid: Option<&str>) -> impl Iterator<Item = &str> {
        self.instances(series_uid).iter().map(String::as_str)
    }

    fn filename_of(&self, instance_uid: &str) -> String {
        self.instance_file_map()
            .get(instance_uid)
            .cloned()
            .unwrap_or_default()
    }
}
