use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use maint_predict::data::model::{CellValue, Table};
use maint_predict::data::writer::write_csv_file;
use maint_predict::features::{
    AIR_TEMPERATURE, PROCESS_TEMPERATURE, ROTATIONAL_SPEED, TOOL_WEAR, TORQUE, TYPE,
};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Reading {
    machine_id: String,
    equipment_type: &'static str,
    air: f64,
    process: f64,
    rpm: i64,
    torque: f64,
    wear: i64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn generate(rng: &mut SimpleRng, n: usize) -> Vec<Reading> {
    (0..n)
        .map(|i| {
            // Roughly 60% low, 30% medium, 10% high quality variants.
            let u = rng.next_f64();
            let equipment_type = if u < 0.6 {
                "L"
            } else if u < 0.9 {
                "M"
            } else {
                "H"
            };

            let air = rng.gauss(300.0, 2.0).clamp(295.0, 305.0);
            let process = (air + 10.0 + rng.gauss(0.0, 1.0)).clamp(305.0, 315.0);
            let rpm = rng.gauss(1540.0, 180.0).clamp(1168.0, 2772.0);
            // Torque falls as speed rises.
            let torque = (40.0 - (rpm - 1540.0) * 0.04 + rng.gauss(0.0, 8.0)).clamp(3.8, 76.6);
            let wear = (rng.next_f64() * 240.0).floor();

            Reading {
                machine_id: format!("M-{:05}", i + 1),
                equipment_type,
                air: round1(air),
                process: round1(process),
                rpm: rpm.round() as i64,
                torque: round1(torque),
                wear: wear as i64,
            }
        })
        .collect()
}

fn write_parquet(readings: &[Reading], path: &Path) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("machine_id", DataType::Utf8, false),
        Field::new(TYPE, DataType::Utf8, false),
        Field::new(AIR_TEMPERATURE, DataType::Float64, false),
        Field::new(PROCESS_TEMPERATURE, DataType::Float64, false),
        Field::new(ROTATIONAL_SPEED, DataType::Int64, false),
        Field::new(TORQUE, DataType::Float64, false),
        Field::new(TOOL_WEAR, DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                readings.iter().map(|r| r.machine_id.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                readings.iter().map(|r| r.equipment_type).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                readings.iter().map(|r| r.air).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                readings.iter().map(|r| r.process).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                readings.iter().map(|r| r.rpm).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                readings.iter().map(|r| r.torque).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                readings.iter().map(|r| r.wear).collect::<Vec<_>>(),
            )),
        ],
    )
    .expect("Failed to create RecordBatch");

    let file = std::fs::File::create(path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");
}

fn to_table(readings: &[Reading]) -> Table {
    let headers = [
        "machine_id",
        TYPE,
        AIR_TEMPERATURE,
        PROCESS_TEMPERATURE,
        ROTATIONAL_SPEED,
        TORQUE,
        TOOL_WEAR,
    ];
    let rows = readings
        .iter()
        .map(|r| {
            vec![
                CellValue::String(r.machine_id.clone()),
                CellValue::String(r.equipment_type.to_string()),
                CellValue::Float(r.air),
                CellValue::Float(r.process),
                CellValue::Integer(r.rpm),
                CellValue::Float(r.torque),
                CellValue::Integer(r.wear),
            ]
        })
        .collect();
    Table::new(headers.iter().map(|h| h.to_string()).collect(), rows)
}

/// Usage: generate_sample [OUTPUT_DIR] [ROWS]
fn main() {
    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));
    let n: usize = args
        .next()
        .map(|s| s.parse().expect("ROWS must be a positive integer"))
        .unwrap_or(200);

    std::fs::create_dir_all(&out_dir).expect("Failed to create output directory");

    let mut rng = SimpleRng::new(42);
    let readings = generate(&mut rng, n);

    let parquet_path = out_dir.join("sample_readings.parquet");
    write_parquet(&readings, &parquet_path);

    let csv_path = out_dir.join("sample_readings.csv");
    write_csv_file(&to_table(&readings), &csv_path).expect("Failed to write CSV");

    println!(
        "Wrote {n} readings to {} and {}",
        parquet_path.display(),
        csv_path.display()
    );
}
