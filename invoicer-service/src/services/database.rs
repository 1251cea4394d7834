//! Database service for invoicer-service.
//!
//! All mutations of product stock go through [`Database::adjust_stock`] or
//! the transaction-scoped helper behind it, so every movement lands in the
//! stock ledger. Invoice writes compose the same helper with the nested
//! collection sync so a mid-sync failure rolls the whole call back.

use crate::models::{
    Client, CreateClient, CreateExpense, CreateInvoice, CreateProduct, Expense, ExpenseCategory,
    Frequency, Invoice, InvoiceDetail, InvoiceItem, InvoiceItemDetail, InvoiceItemLine,
    InvoiceStatus, InvoiceTax, InvoiceTaxInput, InvoiceTaxLine, InvoiceTotals, ListClientsFilter,
    ListExpensesFilter, ListInvoicesFilter, ListProductsFilter, Product, StockHistory,
    UpdateClient, UpdateExpense, UpdateInvoice, UpdateProduct, UserSettings, UpdateUserSettings,
};
use crate::services::metrics::{DB_QUERY_DURATION, OUT_OF_STOCK_TOTAL, STOCK_ADJUSTMENTS_TOTAL};
use crate::services::stock::{self, StockDelta};
use crate::services::sync::{self, SyncAction};
use invoicer_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Postgres codes for serialization failure and deadlock; both are transient
/// and the caller may retry the request.
fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
    )
}

fn map_adjust_error(err: sqlx::Error) -> AppError {
    if is_serialization_failure(&err) {
        AppError::Conflict(anyhow::anyhow!(
            "Concurrent stock adjustment, retry: {}",
            err
        ))
    } else {
        AppError::DatabaseError(anyhow::anyhow!("Failed to adjust stock: {}", err))
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicer-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product. `initial_stock` snapshots the creation-time
    /// stock when not given explicitly and never changes afterwards.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_product(
        &self,
        user_id: Uuid,
        input: &CreateProduct,
    ) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        if input.price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "price cannot be negative"
            )));
        }
        if input.initial_stock.is_some_and(|s| s < 0) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "initial_stock cannot be negative"
            )));
        }

        let product_id = Uuid::new_v4();
        let initial_stock = input.initial_stock.unwrap_or(input.stock);
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, user_id, name, description, price, stock, initial_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING product_id, user_id, name, description, price, stock, initial_stock, updated_at
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(initial_stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();

        info!(product_id = %product.product_id, stock = product.stock, "Product created");

        Ok(product)
    }

    /// Get a product by ID for a specific user.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, user_id, name, description, price, stock, initial_stock, updated_at
            FROM products
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products for a user with optional name/description search.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_products(
        &self,
        user_id: Uuid,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = i64::from(filter.page_size.clamp(1, 100));

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, user_id, name, description, price, stock, initial_stock, updated_at
            FROM products
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
              AND ($3::uuid IS NULL OR product_id > $3)
            ORDER BY product_id
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(filter.search.as_deref())
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product's descriptive fields. Stock is deliberately not
    /// updatable here; it changes only through the stock ledger.
    #[instrument(skip(self, input), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        if input.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "price cannot be negative"
            )));
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                updated_at = now()
            WHERE user_id = $1 AND product_id = $2
            RETURNING product_id, user_id, name, description, price, stock, initial_stock, updated_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        timer.observe_duration();

        if let Some(ref p) = product {
            info!(product_id = %p.product_id, "Product updated");
        }

        Ok(product)
    }

    /// Delete a product. Rejected while invoice items still reference it.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn delete_product(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Product is referenced by invoice items and cannot be deleted"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete product: {}", e)),
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(product_id = %product_id, "Product deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Stock Ledger Operations
    // -------------------------------------------------------------------------

    /// Manually adjust a product's stock, appending one ledger row. This is
    /// the only sanctioned entry point for operator stock corrections.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id, adjustment = adjustment))]
    pub async fn adjust_stock(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        adjustment: i32,
        reason: &str,
    ) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_stock"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let product =
            Self::adjust_stock_in_tx(&mut tx, user_id, product_id, adjustment, reason).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        STOCK_ADJUSTMENTS_TOTAL.with_label_values(&["manual"]).inc();
        timer.observe_duration();

        info!(
            product_id = %product.product_id,
            adjustment = adjustment,
            new_stock = product.stock,
            "Stock adjusted"
        );

        Ok(product)
    }

    /// List a product's ledger entries, newest first. Returns `None` when the
    /// product does not exist for this user.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn list_stock_history(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        page_size: i32,
        page_token: Option<i64>,
    ) -> Result<Option<Vec<StockHistory>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_stock_history"])
            .start_timer();

        if self.get_product(user_id, product_id).await?.is_none() {
            return Ok(None);
        }

        let limit = i64::from(page_size.clamp(1, 100));

        let history = sqlx::query_as::<_, StockHistory>(
            r#"
            SELECT history_id, product_id, user_id, adjustment, new_stock, reason, created_utc
            FROM stock_history
            WHERE product_id = $1
              AND ($2::bigint IS NULL OR history_id < $2)
            ORDER BY history_id DESC
            LIMIT $3
            "#,
        )
        .bind(product_id)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list stock history: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(history))
    }

    /// Adjust stock inside an open transaction: lock the product row, check
    /// the floor, write the new stock, append the ledger row. Callers own the
    /// commit so multi-adjustment operations roll back as one unit.
    async fn adjust_stock_in_tx(
        conn: &mut PgConnection,
        user_id: Uuid,
        product_id: Uuid,
        adjustment: i32,
        reason: &str,
    ) -> Result<Product, AppError> {
        // Row lock serializes concurrent adjustments of the same product.
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, user_id, name, description, price, stock, initial_stock, updated_at
            FROM products
            WHERE user_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_adjust_error)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        let new_stock = product.stock + adjustment;
        if new_stock < 0 {
            OUT_OF_STOCK_TOTAL.inc();
            return Err(AppError::OutOfStock {
                product_id,
                shortfall: i64::from(-new_stock),
            });
        }

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock = $3, updated_at = now()
            WHERE user_id = $1 AND product_id = $2
            RETURNING product_id, user_id, name, description, price, stock, initial_stock, updated_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(new_stock)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_adjust_error)?;

        sqlx::query(
            r#"
            INSERT INTO stock_history (product_id, user_id, adjustment, new_stock, reason)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(adjustment)
        .bind(new_stock)
        .bind(reason)
        .execute(&mut *conn)
        .await
        .map_err(map_adjust_error)?;

        Ok(updated)
    }

    /// Apply a line-item transition's ledger adjustments in order.
    async fn apply_stock_deltas(
        conn: &mut PgConnection,
        user_id: Uuid,
        deltas: &[StockDelta],
    ) -> Result<(), AppError> {
        for delta in deltas {
            Self::adjust_stock_in_tx(conn, user_id, delta.product_id, delta.adjustment, delta.reason)
                .await?;
            STOCK_ADJUSTMENTS_TOTAL
                .with_label_values(&[delta.reason])
                .inc();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_client(
        &self,
        user_id: Uuid,
        input: &CreateClient,
    ) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (client_id, user_id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING client_id, user_id, name, email, phone, address, created_utc
            "#,
        )
        .bind(client_id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)))?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Get a client by ID for a specific user.
    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        user_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, user_id, name, email, phone, address, created_utc
            FROM clients
            WHERE user_id = $1 AND client_id = $2
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients for a user with optional name/email search.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_clients(
        &self,
        user_id: Uuid,
        filter: &ListClientsFilter,
    ) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let limit = i64::from(filter.page_size.clamp(1, 100));

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, user_id, name, email, phone, address, created_utc
            FROM clients
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')
              AND ($3::uuid IS NULL OR client_id > $3)
            ORDER BY client_id
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(filter.search.as_deref())
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        user_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address)
            WHERE user_id = $1 AND client_id = $2
            RETURNING client_id, user_id, name, email, phone, address, created_utc
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)))?;

        timer.observe_duration();

        if let Some(ref c) = client {
            info!(client_id = %c.client_id, "Client updated");
        }

        Ok(client)
    }

    /// Delete a client. Rejected while invoices still reference it.
    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn delete_client(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM clients
            WHERE user_id = $1 AND client_id = $2
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Client is referenced by invoices and cannot be deleted"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e)),
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = %client_id, "Client deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its nested items and taxes. Every item reserves
    /// its quantity through the stock ledger; if any product falls short the
    /// whole create rolls back.
    #[instrument(skip(self, input), fields(user_id = %user_id, item_count = input.items.len()))]
    pub async fn create_invoice(
        &self,
        user_id: Uuid,
        input: &CreateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        validate_invoice_fields(
            input.status.as_deref(),
            input.discount_percentage,
            Some(&input.taxes),
        )?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let client: Option<Uuid> = sqlx::query_scalar(
            "SELECT client_id FROM clients WHERE user_id = $1 AND client_id = $2",
        )
        .bind(user_id)
        .bind(input.client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check client: {}", e)))?;
        if client.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, user_id, client_id, title, status, due_date, payment_date, discount_percentage, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING invoice_id, user_id, client_id, title, status, issue_date, due_date, payment_date, discount_percentage, notes, created_utc
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .bind(input.client_id)
        .bind(&input.title)
        .bind(input.status.as_deref().unwrap_or("pending"))
        .bind(input.due_date)
        .bind(input.payment_date)
        .bind(input.discount_percentage.unwrap_or(Decimal::ZERO))
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        for item in &input.items {
            let deltas = stock::line_item_deltas(None, Some((item.product_id, item.quantity)));
            Self::apply_stock_deltas(&mut tx, user_id, &deltas).await?;
            sqlx::query(
                r#"
                INSERT INTO invoice_items (item_id, invoice_id, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice item: {}", e))
            })?;
        }

        for tax in &input.taxes {
            sqlx::query(
                r#"
                INSERT INTO invoice_taxes (tax_id, invoice_id, name, rate)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(&tax.name)
            .bind(tax.rate)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice tax: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            item_count = input.items.len(),
            "Invoice created"
        );

        self.invoice_detail(invoice).await
    }

    /// Get an invoice with its items, taxes, and freshly computed totals.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, user_id, client_id, title, status, issue_date, due_date, payment_date, discount_percentage, notes, created_utc
            FROM invoices
            WHERE user_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        match invoice {
            Some(invoice) => Ok(Some(self.invoice_detail(invoice).await?)),
            None => Ok(None),
        }
    }

    /// List invoices for a user, each with computed totals.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_invoices(
        &self,
        user_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = i64::from(filter.page_size.clamp(1, 100));

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, user_id, client_id, title, status, issue_date, due_date, payment_date, discount_percentage, notes, created_utc
            FROM invoices
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::varchar IS NULL OR title ILIKE '%' || $3 || '%' OR notes ILIKE '%' || $3 || '%')
              AND ($4::uuid IS NULL OR invoice_id > $4)
            ORDER BY invoice_id
            LIMIT $5
            "#,
        )
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.search.as_deref())
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let mut details = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            details.push(self.invoice_detail(invoice).await?);
        }

        timer.observe_duration();

        Ok(details)
    }

    /// Update an invoice and synchronize its nested collections. The issue
    /// date is immutable. Omitted collections stay untouched; a submitted
    /// list is reconciled member by member, each item transition routed
    /// through the stock ledger inside the same transaction.
    #[instrument(skip(self, input), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        validate_invoice_fields(
            input.status.as_deref(),
            input.discount_percentage,
            input.taxes.as_deref(),
        )?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the invoice row so concurrent syncs of the same invoice
        // cannot interleave their item reconciliation.
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT invoice_id FROM invoices WHERE user_id = $1 AND invoice_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;
        if existing.is_none() {
            return Ok(None);
        }

        if let Some(client_id) = input.client_id {
            let client: Option<Uuid> = sqlx::query_scalar(
                "SELECT client_id FROM clients WHERE user_id = $1 AND client_id = $2",
            )
            .bind(user_id)
            .bind(client_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check client: {}", e))
            })?;
            if client.is_none() {
                return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
            }
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET client_id = COALESCE($3, client_id),
                title = COALESCE($4, title),
                status = COALESCE($5, status),
                due_date = COALESCE($6, due_date),
                payment_date = COALESCE($7, payment_date),
                discount_percentage = COALESCE($8, discount_percentage),
                notes = COALESCE($9, notes)
            WHERE user_id = $1 AND invoice_id = $2
            RETURNING invoice_id, user_id, client_id, title, status, issue_date, due_date, payment_date, discount_percentage, notes, created_utc
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .bind(input.client_id)
        .bind(&input.title)
        .bind(&input.status)
        .bind(input.due_date)
        .bind(input.payment_date)
        .bind(input.discount_percentage)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        if let Some(submitted) = &input.items {
            Self::sync_items_in_tx(&mut tx, user_id, invoice_id, submitted.clone()).await?;
        }

        if let Some(submitted) = &input.taxes {
            Self::sync_taxes_in_tx(&mut tx, invoice_id, submitted.clone()).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Invoice updated");

        Ok(Some(self.invoice_detail(invoice).await?))
    }

    /// Delete an invoice, returning every reserved quantity to its product
    /// through the ledger before the cascade removes items and taxes.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT invoice_id FROM invoices WHERE user_id = $1 AND invoice_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;
        if existing.is_none() {
            return Ok(false);
        }

        let items = Self::invoice_items_in_tx(&mut tx, invoice_id).await?;
        for item in &items {
            let deltas = stock::line_item_deltas(Some((item.product_id, item.quantity)), None);
            Self::apply_stock_deltas(&mut tx, user_id, &deltas).await?;
        }

        sqlx::query("DELETE FROM invoices WHERE user_id = $1 AND invoice_id = $2")
            .bind(user_id)
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, item_count = items.len(), "Invoice deleted");

        Ok(true)
    }

    /// Load an invoice's items inside an open transaction. This is the
    /// explicit read of prior persisted state the sync compares against.
    async fn invoice_items_in_tx(
        conn: &mut PgConnection,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, product_id, quantity, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY created_utc, item_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice items: {}", e)))
    }

    /// Reconcile the submitted item list against the persisted one,
    /// adjusting stock for every create, quantity change, swap, and delete.
    async fn sync_items_in_tx(
        conn: &mut PgConnection,
        user_id: Uuid,
        invoice_id: Uuid,
        submitted: Vec<crate::models::InvoiceItemInput>,
    ) -> Result<(), AppError> {
        let existing = Self::invoice_items_in_tx(conn, invoice_id).await?;
        let existing_ids: Vec<Uuid> = existing.iter().map(|i| i.item_id).collect();
        let prior: HashMap<Uuid, (Uuid, i32)> = existing
            .iter()
            .map(|i| (i.item_id, (i.product_id, i.quantity)))
            .collect();

        let plan = sync::plan(&existing_ids, submitted, |i| i.id);

        for action in plan.actions {
            match action {
                SyncAction::Update { id, record } => {
                    if let Some(&(old_product, old_quantity)) = prior.get(&id) {
                        let deltas = stock::line_item_deltas(
                            Some((old_product, old_quantity)),
                            Some((record.product_id, record.quantity)),
                        );
                        Self::apply_stock_deltas(conn, user_id, &deltas).await?;
                        sqlx::query(
                            r#"
                            UPDATE invoice_items
                            SET product_id = $3, quantity = $4
                            WHERE invoice_id = $1 AND item_id = $2
                            "#,
                        )
                        .bind(invoice_id)
                        .bind(id)
                        .bind(record.product_id)
                        .bind(record.quantity)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| {
                            AppError::DatabaseError(anyhow::anyhow!(
                                "Failed to update invoice item: {}",
                                e
                            ))
                        })?;
                    }
                }
                SyncAction::Create { record } => {
                    let deltas =
                        stock::line_item_deltas(None, Some((record.product_id, record.quantity)));
                    Self::apply_stock_deltas(conn, user_id, &deltas).await?;
                    sqlx::query(
                        r#"
                        INSERT INTO invoice_items (item_id, invoice_id, product_id, quantity)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(invoice_id)
                    .bind(record.product_id)
                    .bind(record.quantity)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to insert invoice item: {}",
                            e
                        ))
                    })?;
                }
            }
        }

        for item_id in plan.delete_ids {
            if let Some(&(product_id, quantity)) = prior.get(&item_id) {
                let deltas = stock::line_item_deltas(Some((product_id, quantity)), None);
                Self::apply_stock_deltas(conn, user_id, &deltas).await?;
                sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1 AND item_id = $2")
                    .bind(invoice_id)
                    .bind(item_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to delete invoice item: {}",
                            e
                        ))
                    })?;
            }
        }

        Ok(())
    }

    /// Reconcile the submitted tax list. Taxes carry no stock bookkeeping.
    async fn sync_taxes_in_tx(
        conn: &mut PgConnection,
        invoice_id: Uuid,
        submitted: Vec<InvoiceTaxInput>,
    ) -> Result<(), AppError> {
        let existing_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT tax_id FROM invoice_taxes WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice taxes: {}", e))
                })?;

        let plan = sync::plan(&existing_ids, submitted, |t| t.id);

        for action in plan.actions {
            match action {
                SyncAction::Update { id, record } => {
                    sqlx::query(
                        r#"
                        UPDATE invoice_taxes
                        SET name = $3, rate = $4
                        WHERE invoice_id = $1 AND tax_id = $2
                        "#,
                    )
                    .bind(invoice_id)
                    .bind(id)
                    .bind(&record.name)
                    .bind(record.rate)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to update invoice tax: {}",
                            e
                        ))
                    })?;
                }
                SyncAction::Create { record } => {
                    sqlx::query(
                        r#"
                        INSERT INTO invoice_taxes (tax_id, invoice_id, name, rate)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(invoice_id)
                    .bind(&record.name)
                    .bind(record.rate)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to insert invoice tax: {}",
                            e
                        ))
                    })?;
                }
            }
        }

        for tax_id in plan.delete_ids {
            sqlx::query("DELETE FROM invoice_taxes WHERE invoice_id = $1 AND tax_id = $2")
                .bind(invoice_id)
                .bind(tax_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice tax: {}", e))
                })?;
        }

        Ok(())
    }

    /// Assemble the full invoice read: lines priced at the current product
    /// price, per-tax amounts, and the monetary roll-up.
    async fn invoice_detail(&self, invoice: Invoice) -> Result<InvoiceDetail, AppError> {
        let items = sqlx::query_as::<_, InvoiceItemDetail>(
            r#"
            SELECT i.item_id, i.product_id, p.name AS product_name, p.price, i.quantity
            FROM invoice_items i
            JOIN products p ON p.product_id = i.product_id
            WHERE i.invoice_id = $1
            ORDER BY i.created_utc, i.item_id
            "#,
        )
        .bind(invoice.invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice items: {}", e))
        })?;

        let taxes = sqlx::query_as::<_, InvoiceTax>(
            r#"
            SELECT tax_id, invoice_id, name, rate, created_utc
            FROM invoice_taxes
            WHERE invoice_id = $1
            ORDER BY created_utc, tax_id
            "#,
        )
        .bind(invoice.invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice taxes: {}", e))
        })?;

        let rates: Vec<Decimal> = taxes.iter().map(|t| t.rate).collect();
        let totals = InvoiceTotals::compute(&items, invoice.discount_percentage, &rates);

        let items = items
            .into_iter()
            .map(|d| {
                let item_total = d.item_total();
                InvoiceItemLine {
                    item_id: d.item_id,
                    product_id: d.product_id,
                    product_name: d.product_name,
                    price: d.price,
                    quantity: d.quantity,
                    item_total,
                }
            })
            .collect();

        let taxes = taxes
            .into_iter()
            .map(|t| InvoiceTaxLine {
                tax_id: t.tax_id,
                name: t.name,
                amount: InvoiceTotals::tax_amount(totals.discounted_subtotal, t.rate),
                rate: t.rate,
            })
            .collect();

        Ok(InvoiceDetail {
            invoice,
            items,
            taxes,
            totals,
        })
    }

    // -------------------------------------------------------------------------
    // Expense Operations
    // -------------------------------------------------------------------------

    /// Create a new expense.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_expense(
        &self,
        user_id: Uuid,
        input: &CreateExpense,
    ) -> Result<Expense, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_expense"])
            .start_timer();

        validate_expense_fields(&input.category, input.is_recurring, input.frequency.as_deref())?;
        if input.amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "amount cannot be negative"
            )));
        }

        let expense_id = Uuid::new_v4();
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (expense_id, user_id, title, amount, category, date, is_recurring, frequency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING expense_id, user_id, title, amount, category, date, is_recurring, frequency, created_utc
            "#,
        )
        .bind(expense_id)
        .bind(user_id)
        .bind(&input.title)
        .bind(input.amount)
        .bind(&input.category)
        .bind(input.date)
        .bind(input.is_recurring)
        .bind(&input.frequency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create expense: {}", e)))?;

        timer.observe_duration();

        info!(expense_id = %expense.expense_id, "Expense created");

        Ok(expense)
    }

    /// Get an expense by ID for a specific user.
    #[instrument(skip(self), fields(user_id = %user_id, expense_id = %expense_id))]
    pub async fn get_expense(
        &self,
        user_id: Uuid,
        expense_id: Uuid,
    ) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT expense_id, user_id, title, amount, category, date, is_recurring, frequency, created_utc
            FROM expenses
            WHERE user_id = $1 AND expense_id = $2
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get expense: {}", e)))?;

        timer.observe_duration();

        Ok(expense)
    }

    /// List expenses for a user with optional category and date filters.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ListExpensesFilter,
    ) -> Result<Vec<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_expenses"])
            .start_timer();

        let limit = i64::from(filter.page_size.clamp(1, 100));

        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT expense_id, user_id, title, amount, category, date, is_recurring, frequency, created_utc
            FROM expenses
            WHERE user_id = $1
              AND ($2::varchar IS NULL OR category = $2)
              AND ($3::date IS NULL OR date >= $3)
              AND ($4::date IS NULL OR date <= $4)
              AND ($5::uuid IS NULL OR expense_id > $5)
            ORDER BY expense_id
            LIMIT $6
            "#,
        )
        .bind(user_id)
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list expenses: {}", e)))?;

        timer.observe_duration();

        Ok(expenses)
    }

    /// Update an expense. The merged recurrence state must stay valid:
    /// recurring expenses carry a frequency, one-off expenses do not.
    #[instrument(skip(self, input), fields(user_id = %user_id, expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        user_id: Uuid,
        expense_id: Uuid,
        input: &UpdateExpense,
    ) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_expense"])
            .start_timer();

        if input.amount.is_some_and(|a| a < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "amount cannot be negative"
            )));
        }

        let existing = match self.get_expense(user_id, expense_id).await? {
            Some(e) => e,
            None => return Ok(None),
        };

        let merged_category = input.category.as_deref().unwrap_or(&existing.category);
        let merged_recurring = input.is_recurring.unwrap_or(existing.is_recurring);
        let merged_frequency = input
            .frequency
            .as_deref()
            .or(existing.frequency.as_deref());
        // A flip to one-off drops the stored frequency rather than failing.
        let merged_frequency = if merged_recurring {
            merged_frequency
        } else if input.frequency.is_some() {
            input.frequency.as_deref()
        } else {
            None
        };
        validate_expense_fields(merged_category, merged_recurring, merged_frequency)?;

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET title = COALESCE($3, title),
                amount = COALESCE($4, amount),
                category = COALESCE($5, category),
                date = COALESCE($6, date),
                is_recurring = COALESCE($7, is_recurring),
                frequency = $8
            WHERE user_id = $1 AND expense_id = $2
            RETURNING expense_id, user_id, title, amount, category, date, is_recurring, frequency, created_utc
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .bind(&input.title)
        .bind(input.amount)
        .bind(&input.category)
        .bind(input.date)
        .bind(input.is_recurring)
        .bind(merged_frequency)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update expense: {}", e)))?;

        timer.observe_duration();

        if let Some(ref e) = expense {
            info!(expense_id = %e.expense_id, "Expense updated");
        }

        Ok(expense)
    }

    /// Delete an expense.
    #[instrument(skip(self), fields(user_id = %user_id, expense_id = %expense_id))]
    pub async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_expense"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM expenses
            WHERE user_id = $1 AND expense_id = $2
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete expense: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(expense_id = %expense_id, "Expense deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // User Settings Operations
    // -------------------------------------------------------------------------

    /// Get a user's settings, falling back to defaults before the first save.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_settings(&self, user_id: Uuid) -> Result<UserSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            SELECT user_id, theme, currency, locale, invoice_footer, company_name, brand_color,
                   account_number, account_name, issuer_name, issuer_title, tax_profiles, updated_at
            FROM user_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings.unwrap_or_else(|| UserSettings::defaults(user_id)))
    }

    /// Upsert a user's settings, merging provided fields over the current
    /// (or default) values.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn update_settings(
        &self,
        user_id: Uuid,
        input: &UpdateUserSettings,
    ) -> Result<UserSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_settings"])
            .start_timer();

        if let Some(profiles) = &input.tax_profiles {
            if !profiles.is_array() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "tax_profiles must be a list"
                )));
            }
        }

        let current = self.get_settings(user_id).await?;

        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            INSERT INTO user_settings (user_id, theme, currency, locale, invoice_footer, company_name,
                                       brand_color, account_number, account_name, issuer_name, issuer_title, tax_profiles)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id) DO UPDATE
            SET theme = EXCLUDED.theme,
                currency = EXCLUDED.currency,
                locale = EXCLUDED.locale,
                invoice_footer = EXCLUDED.invoice_footer,
                company_name = EXCLUDED.company_name,
                brand_color = EXCLUDED.brand_color,
                account_number = EXCLUDED.account_number,
                account_name = EXCLUDED.account_name,
                issuer_name = EXCLUDED.issuer_name,
                issuer_title = EXCLUDED.issuer_title,
                tax_profiles = EXCLUDED.tax_profiles,
                updated_at = now()
            RETURNING user_id, theme, currency, locale, invoice_footer, company_name, brand_color,
                      account_number, account_name, issuer_name, issuer_title, tax_profiles, updated_at
            "#,
        )
        .bind(user_id)
        .bind(input.theme.as_deref().unwrap_or(&current.theme))
        .bind(input.currency.as_deref().unwrap_or(&current.currency))
        .bind(input.locale.as_deref().unwrap_or(&current.locale))
        .bind(
            input
                .invoice_footer
                .as_deref()
                .unwrap_or(&current.invoice_footer),
        )
        .bind(
            input
                .company_name
                .as_deref()
                .or(current.company_name.as_deref()),
        )
        .bind(input.brand_color.as_deref().unwrap_or(&current.brand_color))
        .bind(
            input
                .account_number
                .as_deref()
                .unwrap_or(&current.account_number),
        )
        .bind(
            input
                .account_name
                .as_deref()
                .unwrap_or(&current.account_name),
        )
        .bind(
            input
                .issuer_name
                .as_deref()
                .or(current.issuer_name.as_deref()),
        )
        .bind(
            input
                .issuer_title
                .as_deref()
                .or(current.issuer_title.as_deref()),
        )
        .bind(input.tax_profiles.as_ref().unwrap_or(&current.tax_profiles))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update settings: {}", e)))?;

        timer.observe_duration();

        info!(user_id = %user_id, "Settings updated");

        Ok(settings)
    }
}

/// Invoice field checks shared by create and update, applied before any
/// state change.
fn validate_invoice_fields(
    status: Option<&str>,
    discount_percentage: Option<Decimal>,
    taxes: Option<&[InvoiceTaxInput]>,
) -> Result<(), AppError> {
    if let Some(status) = status {
        if InvoiceStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown invoice status '{}'",
                status
            )));
        }
    }
    if let Some(discount) = discount_percentage {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "discount_percentage must be between 0 and 100"
            )));
        }
    }
    if let Some(taxes) = taxes {
        for tax in taxes {
            if tax.rate < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Tax rate cannot be negative"
                )));
            }
        }
    }
    Ok(())
}

/// Expense category and recurrence checks.
fn validate_expense_fields(
    category: &str,
    is_recurring: bool,
    frequency: Option<&str>,
) -> Result<(), AppError> {
    if ExpenseCategory::parse(category).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown expense category '{}'",
            category
        )));
    }
    match (is_recurring, frequency) {
        (true, None) => Err(AppError::BadRequest(anyhow::anyhow!(
            "frequency is required for recurring expenses"
        ))),
        (false, Some(_)) => Err(AppError::BadRequest(anyhow::anyhow!(
            "frequency is only valid for recurring expenses"
        ))),
        (_, Some(f)) if Frequency::parse(f).is_none() => Err(AppError::BadRequest(
            anyhow::anyhow!("Unknown frequency '{}'", f),
        )),
        _ => Ok(()),
    }
}
