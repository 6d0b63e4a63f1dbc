use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, HandraiseService, Principal, Result};
use handraise_domain::{ledger::Reason, redemption};
use handraise_storage::{ledger, models::PointTransaction};

#[derive(Clone, Debug, Serialize)]
pub struct BalanceResponse {
	pub points_balance: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PointTransactionView {
	pub id: i64,
	pub amount: i64,
	pub reason: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl From<PointTransaction> for PointTransactionView {
	fn from(row: PointTransaction) -> Self {
		Self { id: row.id, amount: row.amount, reason: row.reason, created_at: row.created_at }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedeemRequest {
	pub amount: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RedeemResponse {
	pub amount: i64,
	pub points_balance: i64,
	/// Text encoded into the QR image.
	pub payload: String,
	pub qr_data_url: String,
}

impl HandraiseService {
	pub async fn points_balance(&self, principal: &Principal) -> Result<BalanceResponse> {
		let points_balance = ledger::balance(&self.db.pool, principal.user_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Profile not found.".to_string() })?;

		Ok(BalanceResponse { points_balance })
	}

	pub async fn point_transactions(&self, principal: &Principal) -> Result<Vec<PointTransactionView>> {
		let rows = ledger::list_transactions(
			&self.db.pool,
			principal.user_id,
			i64::from(self.cfg.listing.max_transactions),
		)
		.await?;

		Ok(rows.into_iter().map(PointTransactionView::from).collect())
	}

	/// Spends points for a cafeteria QR code.
	///
	/// The QR image is rendered before any write, so a renderer failure leaves the balance intact.
	/// The balance check is repeated by the conditional decrement, which is what actually guards
	/// concurrent redemptions.
	pub async fn redeem_points(
		&self,
		principal: &Principal,
		req: RedeemRequest,
	) -> Result<RedeemResponse> {
		if req.amount <= 0 {
			return Err(Error::InvalidRequest {
				message: "amount must be greater than zero.".to_string(),
			});
		}

		let current = self.points_balance(principal).await?.points_balance;

		if req.amount > current {
			return Err(insufficient_points());
		}

		let now = OffsetDateTime::now_utc();
		let payload = redemption::encode_payload(
			&self.cfg.redemption.protocol_tag,
			&principal.username,
			req.amount,
			now,
		)
		.map_err(|err| Error::InvalidRequest { message: format!("Invalid timestamp: {err}.") })?;
		let png = self.providers.qr.render(&self.cfg.providers.qr, &payload).await?;
		let qr_data_url = format!("data:image/png;base64,{}", STANDARD.encode(png));
		let mut tx = self.db.pool.begin().await?;
		let Some(points_balance) = ledger::redeem(
			&mut tx,
			principal.user_id,
			req.amount,
			Reason::Redeemed.as_str(),
			now,
		)
		.await?
		else {
			return Err(insufficient_points());
		};

		tx.commit().await?;

		tracing::info!(
			user_id = principal.user_id,
			amount = req.amount,
			points_balance,
			"Points redeemed."
		);

		Ok(RedeemResponse { amount: req.amount, points_balance, payload, qr_data_url })
	}
}

fn insufficient_points() -> Error {
	Error::InvalidRequest { message: "Insufficient points.".to_string() }
}
