//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::CompositeArgs;
use crate::{
    color::ReferenceColor,
    config::{CompositeExecution, CompositorConfig, ScaleMode},
    types::{MatteType, SegmentationClass},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated `CompositorConfig` from `composite` arguments
    pub(crate) fn compositor_config(args: &CompositeArgs) -> Result<CompositorConfig> {
        let reference_color = ReferenceColor::parse_hex(&args.reference_color)
            .with_context(|| format!("Invalid --reference-color '{}'", args.reference_color))?;
        let scale_mode = if args.per_axis_scale {
            ScaleMode::PerAxis
        } else {
            ScaleMode::AsCaptured
        };

        CompositorConfig::builder()
            .reference_color(reference_color)
            .scale_mode(scale_mode)
            .resample_filter(args.filter.into())
            .output_format(args.format.into())
            .embed_metadata(!args.no_metadata)
            .build()
            .context("Invalid compositor configuration")
    }

    /// Parse a `--matte-type` value
    ///
    /// "portrait" selects the portrait-effects matte; anything else names a segmentation
    /// class. Unknown classes parse and are rejected by the compositor.
    pub(crate) fn matte_type(value: &str) -> MatteType {
        match value.to_lowercase().as_str() {
            "portrait" | "portrait-effects" => MatteType::PortraitEffects,
            other => MatteType::Segmentation(SegmentationClass::from_name(other)),
        }
    }

    pub(crate) fn composite_execution(inline: bool) -> CompositeExecution {
        if inline {
            CompositeExecution::Inline
        } else {
            CompositeExecution::Blocking
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matte_type_parsing() {
        assert_eq!(CliConfigBuilder::matte_type("Portrait"), MatteType::PortraitEffects);
        assert_eq!(
            CliConfigBuilder::matte_type("hair"),
            MatteType::Segmentation(SegmentationClass::Hair)
        );
        assert!(!CliConfigBuilder::matte_type("clouds").is_supported());
    }
}
