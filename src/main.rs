use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Report, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::PathBuf;

use storefront::config::Config;
use storefront::error::ApiError;
use storefront::shop::catalog::{Product, ProductQuery};
use storefront::shop::orders::OrderStatus;
use storefront::shop::wishlist::{AddStatus, RemoveStatus};
use storefront::{logging, App};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "Browse the store, manage your wishlist and run admin tasks")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storefront/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List products
  Products {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    keyword: Option<String>,
    /// Skip every cache
    #[arg(long)]
    refresh: bool,
  },
  /// Show one product
  Product { id: String },
  /// Featured products
  Featured,
  /// Product categories
  Categories,
  #[command(subcommand)]
  Wishlist(WishlistCommand),
  /// Check a coupon against a cart total
  Coupon {
    code: String,
    #[arg(long)]
    subtotal: Decimal,
  },
  /// Your orders
  Orders,
  /// Where an order is
  Track { id: String },
  /// Sign in (password from STOREFRONT_PASSWORD)
  Login { email: String },
  Logout,
  #[command(subcommand)]
  Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum WishlistCommand {
  List,
  Add { id: String },
  Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
  Users {
    #[arg(long)]
    refresh: bool,
  },
  DeleteUser {
    id: String,
  },
  /// Feature a product on the home page
  Feature {
    id: String,
    /// Un-feature instead
    #[arg(long)]
    off: bool,
  },
  OrderStatus {
    id: String,
    status: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _guard = logging::init(&config.log)?;

  let app = App::new(config)?;
  run(&app, args.command).await
}

async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Products {
      page,
      category,
      keyword,
      refresh,
    } => {
      let query = ProductQuery {
        page,
        category,
        keyword,
      };
      let listing = app.catalog.products(&query, refresh).await.map_err(report)?;
      for product in &listing.products {
        print_product(product);
      }
      println!("page {}/{}", listing.page, listing.pages);
    }
    Command::Product { id } => {
      let product = app.catalog.product(&id).await.map_err(report)?;
      print_product(&product);
      if let Some(description) = &product.description {
        println!("\n{}", description);
      }
    }
    Command::Featured => {
      for product in app.catalog.featured().await.map_err(report)? {
        print_product(&product);
      }
    }
    Command::Categories => {
      for category in app.catalog.categories().await.map_err(report)? {
        println!("{}", category);
      }
    }
    Command::Wishlist(command) => wishlist(app, command).await?,
    Command::Coupon { code, subtotal } => {
      let applied = app.coupons.apply(&code, subtotal).await.map_err(report)?;
      println!(
        "{}: -{} (total {})",
        applied.code, applied.discount, applied.total
      );
    }
    Command::Orders => {
      for order in app.orders.mine().await.map_err(report)? {
        println!("{}  {:<10}  {}", order.id, order.status, order.total);
      }
    }
    Command::Track { id } => {
      let tracking = app.orders.track(&id).await.map_err(report)?;
      if tracking.is_cancelled() {
        println!("{}: cancelled", id);
      } else {
        println!(
          "{}: {} (step {} of {})",
          id, tracking.status, tracking.step, tracking.total_steps
        );
      }
    }
    Command::Login { email } => {
      let password = Config::get_password()?;
      let profile = app.auth.login(&email, &password).await.map_err(report)?;
      let role = if profile.is_admin { " (admin)" } else { "" };
      println!("Signed in as {}{}", profile.name, role);
    }
    Command::Logout => {
      app.auth.logout().map_err(report)?;
      println!("Signed out");
    }
    Command::Admin(command) => admin(app, command).await?,
  }

  Ok(())
}

async fn wishlist(app: &App, command: WishlistCommand) -> Result<()> {
  app.wishlist.load().await.map_err(report)?;

  match command {
    WishlistCommand::List => {
      for item in app.wishlist.items() {
        let name = item
          .product_data
          .get("name")
          .and_then(Value::as_str)
          .unwrap_or("");
        println!("{}  {}", item.product_id, name);
      }
    }
    WishlistCommand::Add { id } => {
      let status = app.wishlist.add(&id, Value::Null).await.map_err(report)?;
      match status {
        AddStatus::Added => println!("Added {} to your wishlist", id),
        AddStatus::AlreadyPresent | AddStatus::AlreadyOnServer => {
          println!("{} is already in your wishlist", id)
        }
      }
    }
    WishlistCommand::Remove { id } => {
      match app.wishlist.remove(&id).await.map_err(report)? {
        RemoveStatus::Removed => println!("Removed {}", id),
        RemoveStatus::NotPresent => println!("{} is not in your wishlist", id),
      }
    }
  }

  Ok(())
}

async fn admin(app: &App, command: AdminCommand) -> Result<()> {
  if !app.auth.is_admin() {
    return Err(eyre!("This command needs an admin session. Run `storefront login` first."));
  }

  match command {
    AdminCommand::Users { refresh } => {
      for user in app.admin.users(refresh).await.map_err(report)? {
        let role = if user.is_admin { "admin" } else { "" };
        println!("{}  {:<24}  {:<32}  {}", user.id, user.name, user.email, role);
      }
    }
    AdminCommand::DeleteUser { id } => {
      let remaining = app.admin.delete_user(&id).await.map_err(report)?;
      println!("Deleted {} ({} users left)", id, remaining.len());
    }
    AdminCommand::Feature { id, off } => {
      app.admin.set_featured(&id, !off).await.map_err(report)?;
      let state = if off { "no longer featured" } else { "featured" };
      println!("{} is {}", id, state);
    }
    AdminCommand::OrderStatus { id, status } => {
      let status: OrderStatus = status.parse().map_err(report)?;
      let order = app.orders.update_status(&id, status).await.map_err(report)?;
      println!("{} is now {}", order.id, order.status);
    }
  }

  Ok(())
}

fn print_product(product: &Product) {
  let featured = if product.is_featured { "*" } else { " " };
  let stock = if product.in_stock() { "" } else { "  (out of stock)" };
  println!(
    "{} {}  {:<40}  {:>10}{}",
    featured, product.id, product.name, product.price, stock
  );
}

/// Full error to the log, the user-facing text to the terminal.
fn report(e: ApiError) -> Report {
  tracing::debug!(error = ?e, "command failed");
  eyre!(e.user_message())
}
