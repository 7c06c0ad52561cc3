pub mod align;
pub mod error;
pub mod export;
pub mod geometry;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod spatial;
pub mod tolerances;

pub use align::{align_shared_boundaries, AlignReport, SegmentKey, SharedBoundarySegment};
pub use error::GeometryError;
pub use export::{export_crc, segment_group, ExportSegment, CRC_CRS_NAME};
pub use geometry::{polygons_from_geojson, GroupGeometry};
pub use merge::{merge_all, merge_group, partition, Bucket};
pub use models::{
    AreaMetadata, AreaPolygon, AreaRecord, GroupInfo, GroupPolygon, NewSplit, NewSplitGroup,
    Split, SplitDetail, SplitGroup, SplitGroupDetail, SplitSummary,
};
pub use pipeline::{combine, CombinedBoundaries, ExportFormat};
pub use tolerances::{AlignTolerances, ExportTolerances, MergeTolerances, PipelineConfig};
