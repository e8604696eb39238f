//! End-to-end run on randomly generated shop/item sales
//!
//! Writes a raw sales file into a temporary directory, then runs the three
//! pipeline stages and prints the first predictions.

use chrono::{Duration, NaiveDate};
use hts_forecast::config::PipelineConfig;
use hts_forecast::logging;
use hts_forecast::pipeline;
use hts_forecast::utils::month_index;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fs;
use std::io::Write;

fn write_raw_sales(path: &std::path::Path, days: i64) -> Result<(), Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(42);
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).ok_or("invalid start date")?;
    let base_month = month_index(start);

    let mut file = fs::File::create(path)?;
    writeln!(file, "date,date_block_num,shop_id,item_id,item_cnt_day")?;
    for offset in 0..days {
        let date = start + Duration::days(offset);
        for shop in [2, 7, 25] {
            for item in [1001, 2552, 4870] {
                // weekly pattern plus noise, with occasional missing days
                if rng.gen_bool(0.15) {
                    continue;
                }
                let weekly = if offset % 7 >= 5 { 3.0 } else { 1.0 };
                let qty = (weekly * rng.gen_range(1.0..4.0_f64)).round();
                writeln!(
                    file,
                    "{},{},{},{},{}",
                    date.format("%d.%m.%Y"),
                    month_index(date) - base_month,
                    shop,
                    item,
                    qty
                )?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_logging();

    let dir = std::env::temp_dir().join("hts_synthetic_pipeline");
    fs::create_dir_all(&dir)?;

    let config = PipelineConfig {
        horizon: 14,
        season_length: 7,
        min_positive_periods: Some(1),
        ..PipelineConfig::rooted_at(&dir)
    };
    write_raw_sales(&config.source_path, 120)?;

    let predictions = pipeline::run(&config)?;
    println!("Predictions written to {}", predictions.display());

    let content = fs::read_to_string(&predictions)?;
    for line in content.lines().take(8) {
        println!("{}", line);
    }
    Ok(())
}
