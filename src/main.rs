use clap::{Parser, Subcommand};
use cut_planner::catalog::{Material, WeightTable};
use cut_planner::config::OptimizerConfig;
use cut_planner::render;
use cut_planner::solver::LinearSolver;
use cut_planner::types::{RequiredCut, StandardStockOption, StockBatch};
use cut_planner::units::{Unit, convert};
use cut_planner::width::{WidthSelection, WidthSolver};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Parser)]
#[command(
    name = "cut_planner",
    about = "Stock-constrained cutting and roll width optimizer"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack linear cuts onto a finite set of stock lengths
    Linear {
        /// Stock as LENGTH:QTY or LENGTH:QTY@RATE (e.g. 144:3 120:2@18.50)
        #[arg(long, num_args = 1.., required = true)]
        stock: Vec<String>,

        /// Required cuts as LENGTH:QTY (e.g. 100:2 30:4)
        #[arg(long = "cuts", num_args = 1.., required = true)]
        cuts: Vec<String>,

        /// Unit of the stock and cut lengths
        #[arg(long, default_value = "in", value_parser = parse_unit)]
        unit: Unit,

        /// Blade kerf charged between adjacent cuts
        #[arg(long, default_value_t = OptimizerConfig::DEFAULT_KERF_IN)]
        kerf: f64,

        /// Unit of the kerf value
        #[arg(long, default_value = "in", value_parser = parse_unit)]
        kerf_unit: Unit,

        /// Weight per unit length of the stock, adds piece weights to the summary
        #[arg(long)]
        weight: Option<Decimal>,

        /// Show an ASCII bar for each stock piece
        #[arg(long)]
        layout: bool,
    },
    /// Pick the narrowest roll width for a panel
    Width {
        /// Standard roll widths
        #[arg(long, num_args = 1..)]
        widths: Vec<Decimal>,

        /// Required panel width
        #[arg(long)]
        width: Decimal,

        /// Required panel length
        #[arg(long)]
        length: Decimal,

        /// Unit of every dimension
        #[arg(long, default_value = "in", value_parser = parse_unit)]
        unit: Unit,
    },
}

fn parse_unit(s: &str) -> Result<Unit, String> {
    s.parse::<Unit>().map_err(|e| e.to_string())
}

fn parse_length(s: &str, whole: &str) -> Result<Decimal, String> {
    let length = s
        .parse::<Decimal>()
        .map_err(|_| format!("invalid length in '{}'", whole))?;
    if length <= Decimal::ZERO {
        return Err(format!("length must be positive in '{}'", whole));
    }
    Ok(length)
}

fn parse_qty(s: &str, whole: &str) -> Result<u32, String> {
    let qty = s
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", whole))?;
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", whole));
    }
    Ok(qty)
}

fn parse_stock(s: &str, unit: Unit) -> Result<StockBatch, String> {
    let (body, rate) = match s.split_once('@') {
        Some((body, rate)) => (
            body,
            rate.parse::<Decimal>()
                .map_err(|_| format!("invalid rate in '{}'", s))?,
        ),
        None => (s, Decimal::ZERO),
    };
    let (length, qty) = body
        .split_once(':')
        .ok_or_else(|| format!("invalid stock '{}', expected LENGTH:QTY[@RATE]", s))?;
    Ok(StockBatch {
        length: parse_length(length, s)?,
        unit,
        quantity: parse_qty(qty, s)?,
        unit_rate: rate,
    })
}

fn parse_cut(s: &str, unit: Unit) -> Result<Vec<RequiredCut>, String> {
    let (length, qty) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid cut '{}', expected LENGTH:QTY", s))?;
    let length = parse_length(length, s)?;
    let qty = parse_qty(qty, s)?;
    let inches = length
        .to_f64()
        .ok_or_else(|| format!("invalid length in '{}'", s))
        .and_then(|l| convert(l, unit, Unit::Inch).map_err(|e| e.to_string()))?;
    Ok((1..=qty)
        .map(|n| RequiredCut::new(inches, format!("{} {} #{}", length.normalize(), unit, n)))
        .collect())
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn run_linear(
    stock: &[String],
    cuts: &[String],
    unit: Unit,
    config: OptimizerConfig,
    weight: Option<Decimal>,
    layout: bool,
) {
    let batches: Vec<StockBatch> = stock
        .iter()
        .map(|s| parse_stock(s, unit))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e));

    let required: Vec<RequiredCut> = cuts
        .iter()
        .map(|c| parse_cut(c, unit))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e))
        .into_iter()
        .flatten()
        .collect();

    let mut material = Material::new("cli", &batches);
    let mut solver = LinearSolver::new(config);
    if let Some(rate) = weight {
        material.gauge = Some(material.id.clone());
        solver = solver.with_weights(WeightTable::new(unit).with_rate(material.id.clone(), rate));
    }
    let plan = solver
        .catalog(&material)
        .and_then(|catalog| solver.solve(&catalog, &required))
        .unwrap_or_else(|e| fail(e));

    let shown = |inches: f64| {
        convert(inches, Unit::Inch, unit)
            .map(render::format_length)
            .unwrap_or_else(|e| fail(e))
    };

    for (i, piece) in plan.pieces.iter().enumerate() {
        let lengths: Vec<String> = piece.cuts.iter().map(|c| shown(c.length)).collect();
        println!(
            "Piece {}: {} [{}] scrap {} {}",
            i + 1,
            piece.stock,
            lengths.join(", "),
            shown(piece.scrap_length),
            unit
        );
        if layout {
            print!("{}", render::render_piece(piece, plan.kerf));
        }
    }
    println!();

    for usage in &plan.summary.by_stock {
        println!(
            "  {} x {}: scrap {} {}, cost {}",
            usage.count,
            usage.stock,
            shown(usage.total_scrap),
            unit,
            usage.cost
        );
    }
    println!(
        "Summary: {} piece{} used, {} {} scrap, {:.1}% utilization, cost {}",
        plan.piece_count(),
        if plan.piece_count() == 1 { "" } else { "s" },
        shown(plan.summary.total_scrap),
        unit,
        plan.summary.utilization_percent,
        plan.summary.total_cost,
    );
    if let Some(total) = plan.summary.total_weight {
        println!("Weight: {}", total.normalize());
    }
}

fn run_width(widths: &[Decimal], width: Decimal, length: Decimal, unit: Unit) {
    let options: Vec<StandardStockOption> = widths
        .iter()
        .map(|&w| StandardStockOption::new(w, unit))
        .collect();
    let plan = WidthSolver::new()
        .solve(&options, width, length, unit)
        .unwrap_or_else(|e| fail(e));

    match plan.selection {
        WidthSelection::AsGiven { width, roll_length } => {
            println!("Roll width {width} {unit}, cut length {roll_length} {unit}");
        }
        WidthSelection::Swapped { width, roll_length } => {
            println!("Roll width {width} {unit}, cut length {roll_length} {unit} [rotated]");
        }
        WidthSelection::Unoptimized => {
            println!("No standard widths configured; required area used as consumed");
        }
    }
    println!(
        "Summary: {:.3} {} consumed, {:.3} {} wasted, {:.1}% efficiency",
        plan.consumed_area,
        plan.area_unit,
        plan.wasted_area,
        plan.area_unit,
        plan.efficiency_percent,
    );
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Linear {
            stock,
            cuts,
            unit,
            kerf,
            kerf_unit,
            weight,
            layout,
        } => {
            let config = OptimizerConfig::default()
                .with_display_unit(unit)
                .with_kerf(kerf, kerf_unit)
                .unwrap_or_else(|e| fail(e));
            run_linear(&stock, &cuts, unit, config, weight, layout);
        }
        Command::Width {
            widths,
            width,
            length,
            unit,
        } => run_width(&widths, width, length, unit),
    }
}
