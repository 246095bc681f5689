use plotters::prelude::*;
use thiserror::Error;

use crate::domain::bucket::AggregatedBucket;

#[derive(Error, Debug)]
pub enum BucketChartError {
    #[error("no data to chart")]
    EmptyBuckets,
    #[error("failed to render chart: {0}")]
    Plot(String),
}

const PALETTE: [RGBColor; 6] = [
    RGBColor(136, 132, 216),
    RGBColor(130, 202, 157),
    RGBColor(255, 198, 88),
    RGBColor(255, 128, 66),
    RGBColor(0, 136, 254),
    RGBColor(0, 196, 159),
];

pub async fn write_bucket_chart_png(
    output_path: &str,
    title: &str,
    buckets: &[AggregatedBucket],
) -> Result<(), BucketChartError> {
    if buckets.is_empty() {
        return Err(BucketChartError::EmptyBuckets);
    }
    let output_path = output_path.to_string();
    let title = title.to_string();
    let buckets = buckets.to_vec();
    tokio::task::spawn_blocking(move || render_chart_png(&output_path, &title, &buckets))
        .await
        .map_err(|e| BucketChartError::Plot(e.to_string()))??;
    Ok(())
}

fn render_chart_png(
    output_path: &str,
    title: &str,
    buckets: &[AggregatedBucket],
) -> Result<(), BucketChartError> {
    let max_total = buckets.iter().map(|bucket| bucket.total).max().unwrap_or(0);
    let max_y = max_total.saturating_add(max_total / 10).max(1);
    let max_x = buckets.len().max(1) as i32;

    let root = BitMapBackend::new(output_path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| BucketChartError::Plot(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 30))
        .x_label_area_size(70)
        .y_label_area_size(75)
        .build_cartesian_2d(0..max_x, 0..max_y)
        .map_err(|e| BucketChartError::Plot(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Visitors")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 20))
        .x_labels(buckets.len().min(24))
        .x_label_formatter(&|index| {
            if *index < 0 {
                return String::new();
            }
            buckets
                .get(*index as usize)
                .map(|bucket| bucket.label.clone())
                .unwrap_or_default()
        })
        .draw()
        .map_err(|e| BucketChartError::Plot(e.to_string()))?;

    chart
        .draw_series(buckets.iter().enumerate().map(|(idx, bucket)| {
            let color = PALETTE[idx % PALETTE.len()];
            Rectangle::new(
                [(idx as i32, 0), (idx as i32 + 1, bucket.total)],
                ShapeStyle::from(&color).filled().stroke_width(1),
            )
        }))
        .map_err(|e| BucketChartError::Plot(e.to_string()))?;

    root.present()
        .map_err(|e| BucketChartError::Plot(e.to_string()))?;
    Ok(())
}
