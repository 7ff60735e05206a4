//! CLI front-end for the food cart: edit a persisted cart and place orders.

use core::str::FromStr as _;
use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use foodcart_rs::backend::{OrderBackend, OrderClient};
use foodcart_rs::cart::{Cart, Hydration};
use foodcart_rs::checkout::{CheckoutSession, OrderReceipt};
use foodcart_rs::error::CheckoutError;
use foodcart_rs::models::{
    CartSnapshot, Decimal, DeliveryLocation, IdempotencyKey, MenuItemRef, MerchantId, ProductId,
};
use foodcart_rs::resolver::SwitchPrompt;
use foodcart_rs::storage::{FileStorage, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Environment variable holding the order backend base URL.
const API_URL_ENV: &str = "FOODCART_API_URL";

/// Environment variable holding the optional bearer token.
const TOKEN_ENV: &str = "FOODCART_TOKEN";

/// Storage key for the idempotency key of an unfinished checkout.
const SESSION_KEY: &str = "checkout-session";

/// Food cart CLI: build a cart and place the order.
#[derive(Debug, Parser)]
#[command(name = "foodcart", version, about)]
struct Cli {
    /// Override the storage directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Show the cart.
    Show,
    /// Add an item, asking before replacing a cart from another merchant.
    Add(AddArgs),
    /// Remove one unit of an item.
    Remove {
        /// Product identifier.
        item_id: String,
    },
    /// Set the quantity of an item (0 removes it).
    SetQty {
        /// Product identifier.
        item_id: String,
        /// New quantity.
        qty: u32,
    },
    /// Apply a coupon code, or remove it when no code is given.
    Coupon {
        /// Coupon code.
        code: Option<String>,
    },
    /// Empty the cart.
    Clear,
    /// Submit the cart as an order.
    Checkout {
        /// Delivery latitude. Requires --lon.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Delivery longitude. Requires --lat.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
}

/// Arguments for the `add` subcommand.
#[derive(Debug, Args)]
struct AddArgs {
    /// Merchant identifier.
    merchant_id: String,
    /// Merchant display name.
    merchant_name: String,
    /// Product identifier.
    item_id: String,
    /// Item display name.
    name: String,
    /// Unit price.
    #[arg(value_parser = parse_price)]
    price: Decimal,
    /// Number of units to add.
    #[arg(long, default_value_t = 1)]
    qty: u32,
    /// Replace a cart from another merchant without asking.
    #[arg(long)]
    yes: bool,
}

/// Parses a non-negative decimal price for clap.
fn parse_price(s: &str) -> Result<Decimal, String> {
    let price = Decimal::from_str(s).map_err(|err| format!("{err}"))?;
    if price < Decimal::ZERO {
        return Err("price must not be negative".to_owned());
    }
    Ok(price)
}

/// Prints an error line and returns a failing exit code.
fn fail(message: core::fmt::Arguments<'_>) -> io::Result<ExitCode> {
    writeln!(io::stderr().lock(), "{} {message}", "error:".red().bold())?;
    Ok(ExitCode::FAILURE)
}

/// Reads the backend URL and token from the environment.
fn read_backend_config() -> io::Result<Option<(String, Option<String>)>> {
    let token = std::env::var(TOKEN_ENV).ok().filter(|val| !val.is_empty());
    match std::env::var(API_URL_ENV) {
        Ok(val) if !val.is_empty() => Ok(Some((val, token))),
        _ => {
            let mut err = io::stderr().lock();
            writeln!(
                err,
                "{} {} environment variable is not set",
                "error:".red().bold(),
                API_URL_ENV.bold()
            )?;
            writeln!(
                err,
                "  {} create a .env file with {}=<backend base url>",
                "hint:".cyan(),
                API_URL_ENV
            )?;
            Ok(None)
        }
    }
}

/// Runs the CLI, returning an appropriate exit code.
async fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let storage = match create_storage(cli.data_dir) {
        Ok(storage) => storage,
        Err(err) => return fail(format_args!("failed to initialize storage: {err}")),
    };
    let cart = match Cart::builder().storage(storage).build() {
        Ok(cart) => cart,
        Err(err) => return fail(format_args!("failed to open cart: {err}")),
    };
    if cart.hydrate().await == Hydration::Discarded {
        writeln!(
            io::stderr().lock(),
            "{} saved cart was unreadable and has been reset",
            "warning:".yellow().bold()
        )?;
    }

    let code = dispatch(&cart, cli.command).await?;
    cart.flush().await;
    Ok(code)
}

/// Creates the storage backend, using `data_dir` if provided or the
/// default XDG data directory otherwise.
fn create_storage(data_dir: Option<PathBuf>) -> foodcart_rs::error::Result<FileStorage> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Dispatches to the appropriate subcommand handler.
async fn dispatch<S: Storage>(cart: &Cart<S>, command: Command) -> io::Result<ExitCode> {
    match command {
        Command::Show => cmd_show(cart),
        Command::Add(args) => cmd_add(cart, args, ask_switch).await,
        Command::Remove { item_id } => cmd_remove(cart, &ProductId::new(item_id)),
        Command::SetQty { item_id, qty } => cmd_set_qty(cart, &ProductId::new(item_id), qty),
        Command::Coupon { code } => cmd_coupon(cart, code.as_deref()),
        Command::Clear => cmd_clear(cart).await,
        Command::Checkout { lat, lon } => {
            let Some((base_url, token)) = read_backend_config()? else {
                return Ok(ExitCode::FAILURE);
            };
            let mut builder = OrderClient::builder().base_url(base_url);
            if let Some(token) = token {
                builder = builder.token(token);
            }
            let client = match builder.build() {
                Ok(client) => client,
                Err(err) => return fail(format_args!("failed to build client: {err}")),
            };
            let location = lat
                .zip(lon)
                .map(|(latitude, longitude)| DeliveryLocation { latitude, longitude });
            cmd_checkout(cart, client, location).await
        }
    }
}

/// Executes the `show` subcommand.
fn cmd_show<S: Storage>(cart: &Cart<S>) -> io::Result<ExitCode> {
    print_cart(&cart.snapshot())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `add` subcommand. `decide` is asked whether to replace a
/// cart bound to another merchant, unless `--yes` was given.
async fn cmd_add<S, F>(cart: &Cart<S>, args: AddArgs, decide: F) -> io::Result<ExitCode>
where
    S: Storage,
    F: FnOnce(&SwitchPrompt) -> io::Result<bool>,
{
    let item = MenuItemRef::new(ProductId::new(args.item_id), args.name, args.price);
    cart.add_item_with_quantity(
        MerchantId::new(args.merchant_id),
        args.merchant_name,
        item,
        args.qty,
    );

    if let Some(conflict) = cart.pending_conflict() {
        let prompt = conflict.prompt();
        if args.yes || decide(&prompt)? {
            let _switched = cart.confirm_switch();
            forget_checkout_session(cart).await;
            writeln!(
                io::stdout().lock(),
                "{} cart now holds items from {}",
                "Replaced.".yellow().bold(),
                prompt.new_merchant_name
            )?;
        } else {
            let _cancelled = cart.cancel_switch();
            writeln!(
                io::stdout().lock(),
                "{}",
                format_args!("Kept your {} cart.", prompt.old_merchant_name).dimmed()
            )?;
            return Ok(ExitCode::SUCCESS);
        }
    }

    print_cart(&cart.snapshot())?;
    Ok(ExitCode::SUCCESS)
}

/// Asks on the terminal whether to replace the cart.
fn ask_switch(prompt: &SwitchPrompt) -> io::Result<bool> {
    {
        let mut err = io::stderr().lock();
        write!(
            err,
            "Your cart contains items from {}. Discard them and add from {}? [y/N] ",
            prompt.old_merchant_name.bold(),
            prompt.new_merchant_name.bold()
        )?;
        err.flush()?;
    }
    let mut answer = String::new();
    let _read = io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

/// Executes the `remove` subcommand.
fn cmd_remove<S: Storage>(cart: &Cart<S>, item_id: &ProductId) -> io::Result<ExitCode> {
    if cart.snapshot().line(item_id).is_none() {
        return fail(format_args!("item not in cart: {item_id}"));
    }
    cart.remove_item(item_id);
    print_cart(&cart.snapshot())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `set-qty` subcommand.
fn cmd_set_qty<S: Storage>(cart: &Cart<S>, item_id: &ProductId, qty: u32) -> io::Result<ExitCode> {
    if cart.snapshot().line(item_id).is_none() {
        return fail(format_args!("item not in cart: {item_id}"));
    }
    cart.update_quantity(item_id, qty);
    print_cart(&cart.snapshot())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `coupon` subcommand.
fn cmd_coupon<S: Storage>(cart: &Cart<S>, code: Option<&str>) -> io::Result<ExitCode> {
    if cart.snapshot().is_empty() {
        return fail(format_args!("cannot apply a coupon to an empty cart"));
    }
    cart.set_coupon_code(code);
    print_cart(&cart.snapshot())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `clear` subcommand.
async fn cmd_clear<S: Storage>(cart: &Cart<S>) -> io::Result<ExitCode> {
    cart.clear_cart();
    forget_checkout_session(cart).await;
    writeln!(io::stdout().lock(), "{}", "Cart cleared.".green().bold())?;
    Ok(ExitCode::SUCCESS)
}

/// Drops the saved checkout key; the next checkout starts a new session.
async fn forget_checkout_session<S: Storage>(cart: &Cart<S>) {
    if let Err(err) = cart.storage().remove(SESSION_KEY).await {
        tracing::warn!(error = %err, "failed to drop saved checkout session");
    }
}

/// Executes the `checkout` subcommand against `backend`.
///
/// The session key is saved before the first attempt so a failed run can
/// be repeated without risking a second order.
async fn cmd_checkout<S: Storage, B: OrderBackend>(
    cart: &Cart<S>,
    backend: B,
    location: Option<DeliveryLocation>,
) -> io::Result<ExitCode> {
    let key = match cart.storage().get(SESSION_KEY).await {
        Ok(Some(saved)) => IdempotencyKey::from_existing(saved.trim().to_owned()),
        Ok(None) => {
            let fresh = IdempotencyKey::generate();
            if let Err(err) = cart.storage().set(SESSION_KEY, fresh.to_string()).await {
                return fail(format_args!("failed to save checkout session: {err}"));
            }
            fresh
        }
        Err(err) => return fail(format_args!("failed to read checkout session: {err}")),
    };
    let session = CheckoutSession::with_key(backend, key);

    let spinner = make_spinner("Placing order...");
    let outcome = session.submit(cart, location).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(receipt) => {
            forget_checkout_session(cart).await;
            print_receipt(&receipt)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ CheckoutError::Transport(_)) => {
            let mut out = io::stderr().lock();
            writeln!(out, "{} {err}", "error:".red().bold())?;
            writeln!(
                out,
                "  {} run checkout again; the order will not be placed twice",
                "hint:".cyan()
            )?;
            Ok(ExitCode::FAILURE)
        }
        Err(err) => fail(format_args!("{err}")),
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Prints the cart as a table.
fn print_cart(snapshot: &CartSnapshot) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if snapshot.is_empty() {
        writeln!(out, "{}", "Your cart is empty.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Item").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Qty").fg(Color::Cyan),
        Cell::new("Price").fg(Color::Cyan),
        Cell::new("Total").fg(Color::Cyan),
    ]);

    for line in &snapshot.items {
        _ = table.add_row(vec![
            Cell::new(&line.item.id),
            Cell::new(&line.item.name),
            Cell::new(line.quantity),
            Cell::new(format!("{:.2}", line.item.unit_price)),
            Cell::new(format!("{:.2}", line.line_total())),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        snapshot
            .merchant_name
            .as_deref()
            .unwrap_or("Cart")
            .green()
            .bold(),
        format_args!("({} items)", snapshot.item_count()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    if let Some(code) = snapshot.coupon_code.as_deref() {
        writeln!(out, "{} {code}", "Coupon:".bold())?;
    }
    writeln!(out, "{} {:.2}", "Total:".bold(), snapshot.total())?;
    Ok(())
}

/// Prints the receipt of a placed order.
fn print_receipt(receipt: &OrderReceipt) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", "Order placed!".green().bold())?;
    writeln!(out, "  {} {}", "Order:".bold(), receipt.order_id)?;
    writeln!(out, "  {} {:.2}", "Total:".bold(), receipt.total)?;
    writeln!(
        out,
        "  {}",
        format_args!("key {}", receipt.idempotency_key).dimmed()
    )?;
    Ok(())
}

/// Creates a spinner with the given message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(core::time::Duration::from_millis(80));
    spinner
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            // Last-resort error output; if stderr itself failed, nothing
            // we can do.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use foodcart_rs::backend::InMemoryOrderBackend;
    use foodcart_rs::storage::InMemoryStorage;

    fn empty_cart() -> Cart<InMemoryStorage> {
        Cart::builder().storage(InMemoryStorage::new()).build().unwrap()
    }

    fn add_args(merchant: &str, item: &str, yes: bool) -> AddArgs {
        AddArgs {
            merchant_id: merchant.to_owned(),
            merchant_name: format!("Merchant {merchant}"),
            item_id: item.to_owned(),
            name: format!("Item {item}"),
            price: Decimal::new(10, 0),
            qty: 1,
            yes,
        }
    }

    fn never_asked(_prompt: &SwitchPrompt) -> io::Result<bool> {
        Err(io::Error::other("prompt should not be shown"))
    }

    // ── Argument parsing ─────────────────────────────────────────────

    #[test]
    fn parse_price_accepts_decimals() {
        assert_eq!(parse_price("12.50").unwrap(), Decimal::new(1_250, 2));
        assert!(parse_price("-1").is_err());
        assert!(parse_price("abc").is_err());
    }

    #[test]
    fn cli_parses_add() {
        let cli = Cli::try_parse_from([
            "foodcart", "add", "m1", "Pizza Place", "p1", "Margherita", "10", "--qty", "2",
        ])
        .unwrap();
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.qty, 2);
        assert!(!args.yes);
        assert_eq!(args.price, Decimal::new(10, 0));
    }

    #[test]
    fn cli_checkout_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["foodcart", "checkout", "--lat", "12.9"]).is_err());
        let cli =
            Cli::try_parse_from(["foodcart", "checkout", "--lat", "-33.8", "--lon", "151.2"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Checkout {
                lat: Some(_),
                lon: Some(_)
            }
        ));
    }

    #[test]
    fn make_spinner_creates_spinner() {
        let spinner = make_spinner("Testing...");
        spinner.finish_and_clear();
    }

    // ── cmd_* tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn cmd_add_then_show() {
        let cart = empty_cart();
        let code = cmd_add(&cart, add_args("m1", "p1", false), never_asked)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cmd_show(&cart).unwrap(), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn cmd_add_conflict_declined_keeps_cart() {
        let cart = empty_cart();
        let _first = cmd_add(&cart, add_args("m1", "p1", false), never_asked)
            .await
            .unwrap();
        let code = cmd_add(&cart, add_args("m2", "b1", false), |_prompt| Ok(false))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(cart.snapshot().merchant_id, Some(MerchantId::from("m1")));
        assert!(cart.pending_conflict().is_none());
    }

    #[tokio::test]
    async fn cmd_add_conflict_with_yes_switches() {
        let cart = empty_cart();
        let _first = cmd_add(&cart, add_args("m1", "p1", false), never_asked)
            .await
            .unwrap();
        let _second = cmd_add(&cart, add_args("m2", "b1", true), never_asked)
            .await
            .unwrap();
        assert_eq!(cart.snapshot().merchant_id, Some(MerchantId::from("m2")));
        assert_eq!(cart.item_count(), 1);
    }

    #[tokio::test]
    async fn cmd_remove_unknown_item_fails() {
        let cart = empty_cart();
        let code = cmd_remove(&cart, &ProductId::from("nope")).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn cmd_coupon_on_empty_cart_fails() {
        let cart = empty_cart();
        assert_eq!(cmd_coupon(&cart, Some("X")).unwrap(), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn cmd_checkout_places_order_and_forgets_session() {
        let cart = empty_cart();
        let _added = cmd_add(&cart, add_args("m1", "p1", false), never_asked)
            .await
            .unwrap();
        let code = cmd_checkout(&cart, InMemoryOrderBackend::new(), None)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(cart.snapshot().is_empty());
        assert!(cart.storage().get(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cmd_checkout_failure_keeps_session_key() {
        let cart = empty_cart();
        let _added = cmd_add(&cart, add_args("m1", "p1", false), never_asked)
            .await
            .unwrap();
        let backend = InMemoryOrderBackend::new();
        backend.drop_next_responses(1).unwrap();

        let code = cmd_checkout(&cart, backend, None).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(cart.item_count(), 1);
        let saved = cart.storage().get(SESSION_KEY).await.unwrap();
        assert!(saved.is_some());
    }

    #[tokio::test]
    async fn cmd_clear_forgets_session() {
        let storage = InMemoryStorage::with_entry(SESSION_KEY, "1-abc");
        let cart = Cart::builder().storage(storage).build().unwrap();
        assert_eq!(cmd_clear(&cart).await.unwrap(), ExitCode::SUCCESS);
        assert!(cart.storage().get(SESSION_KEY).await.unwrap().is_none());
    }
}
