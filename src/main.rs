use anyhow::{bail, Context, Result};
use clap::Parser;
use matrix_accel_rs::{AccelDriver, Geometry};

// Memory-mapped matrix accelerator simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Args {
    /// Path to the input .mat file: a header line "m n p", then the m*n
    /// elements of A and the n*p elements of B, row-major, whitespace
    /// separated. Lines starting with '#' are comments.
    input: String,

    /// Maximum number of completion polls before giving up
    #[arg(long, default_value_t = 100_000)]
    cycles: u64,

    /// Print logs during simulation
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
}

struct Problem {
    geom: Geometry,
    a: Vec<i8>,
    b: Vec<i8>,
}

fn parse_problem(content: &str) -> Result<Problem> {
    let mut nums = Vec::new();
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("");
        for tok in line.split_whitespace() {
            let v: i64 = tok
                .parse()
                .with_context(|| format!("bad number `{tok}`"))?;
            nums.push(v);
        }
    }
    if nums.len() < 3 {
        bail!("missing `m n p` header");
    }
    let max = Geometry::MAX_WINDOW_ELEMS as i64;
    if nums[..3].iter().any(|&v| v <= 0 || v > max) {
        bail!("dimensions must be in 1..={max}");
    }
    let (m, n, p) = (nums[0] as usize, nums[1] as usize, nums[2] as usize);
    if m * n > Geometry::MAX_WINDOW_ELEMS
        || n * p > Geometry::MAX_WINDOW_ELEMS
        || m * p > Geometry::MAX_WINDOW_ELEMS
    {
        bail!(
            "each matrix is limited to {} elements by its register window",
            Geometry::MAX_WINDOW_ELEMS
        );
    }
    let geom = Geometry::new(m, n, p);
    let body = &nums[3..];
    if body.len() != geom.a_len() + geom.b_len() {
        bail!(
            "expected {} matrix elements, found {}",
            geom.a_len() + geom.b_len(),
            body.len()
        );
    }
    let to_i8 = |v: &i64| -> Result<i8> {
        i8::try_from(*v).with_context(|| format!("element {v} out of i8 range"))
    };
    let a = body[..geom.a_len()].iter().map(to_i8).collect::<Result<_>>()?;
    let b = body[geom.a_len()..].iter().map(to_i8).collect::<Result<_>>()?;
    Ok(Problem { geom, a, b })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose.log_level() {
        Some(log::Level::Error) => tracing::Level::WARN,
        Some(log::Level::Warn) => tracing::Level::INFO,
        Some(log::Level::Info) => tracing::Level::DEBUG,
        Some(log::Level::Debug) => tracing::Level::TRACE,
        Some(log::Level::Trace) => tracing::Level::TRACE,
        None => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .without_time()
        .init();

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read file `{}`", &args.input))?;
    let problem = parse_problem(&content)?;

    let mut drv = AccelDriver::new(problem.geom);
    drv.init().context("accelerator init failed")?;
    let c = drv
        .multiply(&problem.a, &problem.b, args.cycles)
        .context("multiplication failed")?;

    let Geometry { m, n, p } = problem.geom;
    println!(
        "{}",
        ansi_term::Style::new()
            .bold()
            .paint(format!("C = A({m}x{n}) x B({n}x{p})"))
    );
    for row in 0..m {
        let cells: Vec<String> = (0..p).map(|col| format!("{:>8}", c[row * p + col])).collect();
        println!("{}", cells.join(" "));
    }
    println!(
        "{} cycles",
        ansi_term::Colour::Green.paint(drv.sim().cycle_count().to_string())
    );
    Ok(())
}
