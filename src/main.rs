//! Biomorph search CLI - Find the genotype matching a reference image.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use biomorph_search::{
    EvolutionEngine,
    compute::{
        Reference, ReferenceOptions, evolution::ExhaustiveSearch, load_reference_image,
        prepare_grayscale_reference, prepare_reference,
    },
    schema::{BruteForceConfig, ScoringMode, SearchConfig},
};

/// Contents of the optional JSON configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CliConfig {
    /// Evolutionary search settings.
    #[serde(default)]
    search: SearchConfig,
    /// Reference thresholding settings.
    #[serde(default)]
    reference: ReferenceOptions,
    /// Exhaustive search settings (used with --brute-force).
    #[serde(default)]
    brute_force: BruteForceConfig,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let brute = args.iter().any(|a| a == "--brute-force");
    let positional: Vec<&String> = args
        .iter()
        .skip(1)
        .filter(|a| !a.starts_with("--"))
        .collect();

    if positional.is_empty() {
        eprintln!("Usage: {} <reference-image> [config.json] [--brute-force]", args[0]);
        eprintln!();
        eprintln!("Search for the biomorph genotype whose silhouette matches an image.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  reference-image  PNG/JPEG/BMP/GIF image of the target shape");
        eprintln!("  config.json      Search configuration (default settings if omitted)");
        eprintln!("  --brute-force    Enumerate the configured bounds instead of evolving");
        eprintln!();
        eprintln!("Print an example configuration with --example.");
        std::process::exit(1);
    }

    let image_path = PathBuf::from(positional[0]);
    let config: CliConfig = match positional.get(1) {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => CliConfig::default(),
    };

    let image = load_reference_image(&image_path).unwrap_or_else(|e| {
        eprintln!("Error loading {}: {}", image_path.display(), e);
        std::process::exit(1);
    });

    println!("Biomorph Search");
    println!("===============");
    println!("Reference: {} ({}x{})", image_path.display(), image.width(), image.height());

    if brute {
        run_brute_force(&image, config);
    } else {
        run_evolution(&image, config);
    }
}

fn run_evolution(image: &image::GrayImage, config: CliConfig) {
    let search = config.search;
    let reference = match search.scoring {
        ScoringMode::Chamfer => {
            Reference::Binary(prepare_reference(image, &search.render, config.reference))
        }
        ScoringMode::Correlation => {
            Reference::Grayscale(prepare_grayscale_reference(image, &search.render))
        }
    };

    println!("{}, scoring: {:?}", search.mode, search.scoring);
    println!(
        "Population: {}, generations: {}",
        search.population_size, search.generations
    );
    println!();

    let mut engine = EvolutionEngine::new(reference, search).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let result = engine.run_with_callback(|progress| {
        if (progress.generation + 1) % 10 == 0 {
            println!(
                "  Generation {}: best={:.4} {} stagnant={} ({:.1}s)",
                progress.generation + 1,
                progress.best.fitness,
                progress.best.genotype,
                progress.stagnant_generations,
                start.elapsed().as_secs_f32()
            );
        }
    });

    println!();
    print_json(&result);
}

fn run_brute_force(image: &image::GrayImage, config: CliConfig) {
    let brute = config.brute_force;
    let reference = prepare_reference(image, &brute.render, config.reference);

    let search = ExhaustiveSearch::new(reference, brute).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let result = search.run_with_callback(|progress| {
        let rate = progress.checked as f64 / start.elapsed().as_secs_f64().max(1e-9);
        println!(
            "  Checked {}/{}: best={:.4} ({:.0}/s)",
            progress.checked,
            progress.total,
            progress.best.map_or(0.0, |b| b.score),
            rate
        );
    });

    println!();
    print_json(&result);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_example_config() {
    println!("Example configuration (config.json):");
    print_json(&CliConfig::default());
}
