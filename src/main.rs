use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use brick_rs::blocks::default_registry;
use brick_rs::blueprint::BlueprintLoader;
use brick_rs::config::Config;
use brick_rs::engine::{AttrType, BuildStatus, Builder, TypedValue};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a blueprint to completion
    Run {
        /// Blueprint path, or name inside the blueprint directory
        #[arg(short, long)]
        file: String,

        /// Keep going when a breakpoint pauses the run
        #[arg(long)]
        resume: bool,
    },
    /// Advance a blueprint a fixed number of steps
    Step {
        #[arg(short, long)]
        file: String,

        /// Number of steps to advance
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: usize,

        /// Block index to start from
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
    /// List registered block types by category
    Blocks,
    /// List blueprints in the blueprint directory
    List,
    /// Print a blueprint's notes, attributes and blocks
    Show {
        #[arg(short, long)]
        file: String,
    },
    /// Write a new blueprint made of the given block types
    New {
        /// Output path
        #[arg(short, long)]
        file: String,

        /// Block type to append (repeatable)
        #[arg(short, long = "block")]
        blocks: Vec<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let registry = default_registry(&config);
    let loader = BlueprintLoader::new(registry).with_blueprint_dir(config.blueprint_dir.clone());

    log::debug!("Using blueprint directory {}", config.blueprint_dir.display());

    match args.command {
        Commands::Run { file, resume } => {
            let mut builder = open(&loader, &config, &file)?;

            let status = loop {
                let status = builder.run_to_completion();
                if status == BuildStatus::Next && resume {
                    continue;
                }
                break status;
            };

            print_statuses(&builder);
            match status {
                BuildStatus::Fail => fail_with_log(&builder)?,
                BuildStatus::Next => {
                    println!("Paused at breakpoint (step {})", builder.next_step())
                }
                _ => println!("Finished {}", file),
            }
        }
        Commands::Step { file, steps, from } => {
            let mut builder = open(&loader, &config, &file)?;
            builder.set_next_step(from);

            for _ in 0..steps {
                let status = builder.advance();
                println!("step -> {} (cursor {})", status, builder.next_step());
                match status {
                    BuildStatus::Fail => {
                        print_statuses(&builder);
                        return fail_with_log(&builder);
                    }
                    BuildStatus::End => break,
                    _ => {}
                }
            }
            print_statuses(&builder);
        }
        Commands::Blocks => {
            for (category, behaviors) in loader.registry().blocks_by_category() {
                println!("{}:", category);
                for behavior in behaviors {
                    let attrs: Vec<String> = behavior
                        .default_attrs()
                        .iter()
                        .map(|(name, typed)| format!("{}: {}", name, typed.attr_type))
                        .collect();
                    println!("  {} ({})", behavior.type_name(), attrs.join(", "));
                }
            }
        }
        Commands::List => {
            if let Some(dir) = loader.blueprint_dir() {
                println!("Blueprints in {}:", dir.display());
            }
            for path in loader.list_blueprints()? {
                let notes = loader
                    .load_definition(&path.to_string_lossy())
                    .map(|def| def.notes)
                    .unwrap_or_else(|e| format!("<unreadable: {}>", e));
                println!("{}\t{}", path.display(), notes);
            }
        }
        Commands::Show { file } => {
            let builder = loader
                .load_blueprint(&file)
                .with_context(|| format!("loading blueprint {}", file))?;

            println!("{} ({})", file, builder.type_name());
            if !builder.notes.is_empty() {
                println!("notes: {}", builder.notes);
            }
            for (name, typed) in builder.attrs() {
                println!("attr {} = {} {}", name, typed.attr_type, typed.value);
            }
            for (index, block) in builder.blocks().iter().enumerate() {
                let flags = match (block.active, block.breakpoint) {
                    (false, _) => " [inactive]",
                    (true, true) => " [breakpoint]",
                    (true, false) => "",
                };
                println!("{:>3}. {} <{}>{}", index, block.name(), block.type_name(), flags);
                for (name, typed) in block.attrs() {
                    println!("       {} = {} {}", name, typed.attr_type, typed.value);
                }
            }
        }
        Commands::New {
            file,
            blocks,
            notes,
        } => {
            let mut builder = Builder::new().with_registry(loader.registry().clone());
            for block_type in &blocks {
                let block = builder
                    .create_block(block_type)
                    .with_context(|| format!("creating block {}", block_type))?;
                builder.add_block(block);
            }
            loader.save_blueprint(&builder, &file, &notes)?;
            println!("Wrote {} with {} blocks", file, builder.len());
        }
    }

    Ok(())
}

fn open(loader: &BlueprintLoader, config: &Config, file: &str) -> anyhow::Result<Builder> {
    let mut builder = loader
        .load_blueprint(file)
        .with_context(|| format!("loading blueprint {}", file))?;

    if builder.attr("build_dir").is_none() {
        builder.set_attr(
            "build_dir",
            TypedValue::new(
                AttrType::Path,
                config.build_dir.to_string_lossy().into_owned(),
            ),
        );
    }
    Ok(builder)
}

fn print_statuses(builder: &Builder) {
    for (index, block) in builder.blocks().iter().enumerate() {
        println!("{:>3}. {:<24} {}", index, block.name(), builder.indicator(index));
        for (name, value) in block.outputs() {
            println!("       -> {} = {}", name, value);
        }
    }
}

fn fail_with_log(builder: &Builder) -> anyhow::Result<()> {
    let failed = builder
        .blocks()
        .iter()
        .find(|b| b.status() == BuildStatus::Fail);
    match failed {
        Some(block) => {
            eprintln!("{}", block.log());
            bail!("block {} failed", block.name())
        }
        None => bail!("build failed"),
    }
}
