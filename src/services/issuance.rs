use crate::{
    config::ApprovalThresholds,
    db::DbPool,
    entities::{
        inventory_item::{self, Entity as InventoryItem},
        invoice_item, parts_used, repair_parts_approval,
        repair_request::Entity as RepairRequest,
        stock_level::{self, Entity as StockLevel},
        warehouse::{self, Entity as Warehouse},
        ApprovalPriority, ApprovalStatus, MovementType, PartsUsedStatus,
    },
    errors::{InsufficientStockDetails, ServiceError, WarehouseStock},
    events::{Event, EventSender},
    services::{alerts, movements, parts_used_store::PartsUsedStore, rollup, stock_levels},
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Cost bands that decide whether an issuance needs sign-off, and by whom.
/// All comparisons are strict: a part landing exactly on a threshold does
/// not trip the next band.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    pub total_cost_threshold: Decimal,
    pub high_priority_threshold: Decimal,
    pub urgent_priority_threshold: Decimal,
    pub unit_price_threshold: Decimal,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            total_cost_threshold: dec!(500),
            high_priority_threshold: dec!(1000),
            urgent_priority_threshold: dec!(5000),
            unit_price_threshold: dec!(1000),
        }
    }
}

impl From<&ApprovalThresholds> for ApprovalPolicy {
    fn from(thresholds: &ApprovalThresholds) -> Self {
        let defaults = Self::default();
        Self {
            total_cost_threshold: decimal_or(thresholds.total_cost, defaults.total_cost_threshold),
            high_priority_threshold: decimal_or(
                thresholds.high_priority,
                defaults.high_priority_threshold,
            ),
            urgent_priority_threshold: decimal_or(
                thresholds.urgent_priority,
                defaults.urgent_priority_threshold,
            ),
            unit_price_threshold: decimal_or(
                thresholds.unit_price,
                defaults.unit_price_threshold,
            ),
        }
    }
}

fn decimal_or(value: f64, fallback: Decimal) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(fallback)
}

impl ApprovalPolicy {
    /// Returns the required approver role and priority, or `None` when
    /// the issuance can complete unattended.
    pub fn evaluate(
        &self,
        total_cost: Decimal,
        unit_purchase_price: Decimal,
    ) -> Option<(ApprovalPriority, &'static str)> {
        if total_cost > self.urgent_priority_threshold {
            Some((ApprovalPriority::Urgent, "owner"))
        } else if total_cost > self.high_priority_threshold {
            Some((ApprovalPriority::High, "manager"))
        } else if total_cost > self.total_cost_threshold
            || unit_purchase_price > self.unit_price_threshold
        {
            Some((ApprovalPriority::Normal, "supervisor"))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IssuePartRequest {
    pub repair_request_id: i64,
    pub inventory_item_id: i64,
    pub warehouse_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub requested_by: Option<i64>,
    /// Invoice to bill the part against, when already known
    pub invoice_id: Option<i64>,
    /// Existing invoice line to back-link instead of creating one
    pub invoice_item_id: Option<i64>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceResult {
    pub parts_used_id: i64,
    pub movement_id: i64,
    pub stock_level: stock_level::Model,
    pub total_cost: Decimal,
    pub total_price: Decimal,
    pub profit: Decimal,
    pub approval_required: bool,
    pub approval_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<String>,
    /// True when the urgent-issue override drove the level negative
    pub negative_stock: bool,
    pub repair_actual_cost: Decimal,
}

/// Issues a part from stock to a repair: one transaction covering the
/// level decrement, the ledger entry, the consumption record, the
/// approval gate, the alert re-evaluation, and the repair cost rollup.
#[derive(Clone)]
pub struct IssuanceService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    parts_store: Arc<dyn PartsUsedStore>,
    policy: ApprovalPolicy,
}

impl IssuanceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        parts_store: Arc<dyn PartsUsedStore>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            parts_store,
            policy,
        }
    }

    #[instrument(skip(self, request), fields(
        repair = request.repair_request_id,
        item = request.inventory_item_id,
        warehouse = request.warehouse_id,
        quantity = request.quantity,
    ))]
    pub async fn issue_part(
        &self,
        request: IssuePartRequest,
    ) -> Result<IssuanceResult, ServiceError> {
        request.validate()?;
        if request.quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "issue quantity must be positive".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let req = request.clone();
        let policy = self.policy.clone();
        let parts_store = Arc::clone(&self.parts_store);

        let (result, alert_raised) = db
            .transaction::<_, (IssuanceResult, Option<(String, String)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let item = InventoryItem::find_active()
                            .filter(inventory_item::Column::Id.eq(req.inventory_item_id))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Inventory item {} not found",
                                    req.inventory_item_id
                                ))
                            })?;

                        RepairRequest::find_active()
                            .filter(
                                crate::entities::repair_request::Column::Id
                                    .eq(req.repair_request_id),
                            )
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Repair request {} not found",
                                    req.repair_request_id
                                ))
                            })?;

                        Warehouse::find_active()
                            .filter(warehouse::Column::Id.eq(req.warehouse_id))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Warehouse {} not found",
                                    req.warehouse_id
                                ))
                            })?;

                        let level = stock_levels::lock_or_create_level(
                            txn,
                            req.inventory_item_id,
                            req.warehouse_id,
                        )
                        .await?;

                        if req.quantity > level.quantity {
                            // Other warehouses with stock on hand make this a
                            // routing problem, not an emergency: reject with
                            // alternatives and leave everything untouched.
                            let alternatives: Vec<WarehouseStock> = StockLevel::find()
                                .filter(
                                    stock_level::Column::InventoryItemId
                                        .eq(req.inventory_item_id),
                                )
                                .filter(stock_level::Column::WarehouseId.ne(req.warehouse_id))
                                .filter(stock_level::Column::Quantity.gt(0))
                                .find_also_related(Warehouse)
                                .filter(warehouse::Column::DeletedAt.is_null())
                                .all(txn)
                                .await?
                                .into_iter()
                                .map(|(lvl, wh)| WarehouseStock {
                                    warehouse_id: lvl.warehouse_id,
                                    warehouse_name: wh
                                        .map(|w| w.name)
                                        .unwrap_or_default(),
                                    quantity: lvl.quantity,
                                })
                                .collect();

                            if !alternatives.is_empty() {
                                return Err(ServiceError::InsufficientStock(
                                    InsufficientStockDetails {
                                        inventory_item_id: req.inventory_item_id,
                                        warehouse_id: req.warehouse_id,
                                        requested: req.quantity,
                                        available: level.quantity,
                                        shortage: req.quantity - level.quantity,
                                        alternatives,
                                    },
                                ));
                            }
                            // No stock anywhere: urgent-issue override. The
                            // repair cannot wait for procurement, so the level
                            // goes negative and gets reconciled later.
                        }

                        let quantity_dec = Decimal::from(req.quantity);
                        let total_cost = item.purchase_price * quantity_dec;
                        let total_price = item.selling_price * quantity_dec;
                        let profit = total_price - total_cost;

                        let gate = policy.evaluate(total_cost, item.purchase_price);
                        let status = if gate.is_some() {
                            PartsUsedStatus::Requested
                        } else {
                            PartsUsedStatus::Used
                        };

                        let level =
                            stock_levels::apply_delta(txn, level, -req.quantity).await?;
                        let negative_stock = level.quantity < 0;

                        let movement = movements::record_movement(
                            txn,
                            movements::NewMovement {
                                inventory_item_id: req.inventory_item_id,
                                movement_type: MovementType::Out,
                                quantity: req.quantity,
                                signed_quantity: -req.quantity,
                                from_warehouse_id: Some(req.warehouse_id),
                                to_warehouse_id: None,
                                reference_type: Some("repair".into()),
                                reference_id: Some(req.repair_request_id),
                                created_by: req.requested_by,
                                notes: req.notes.clone(),
                            },
                        )
                        .await?;

                        let alert = alerts::reflect(txn, &level).await?;

                        let part = parts_store
                            .insert(
                                txn,
                                crate::services::parts_used_store::NewPartsUsed {
                                    repair_request_id: req.repair_request_id,
                                    inventory_item_id: req.inventory_item_id,
                                    warehouse_id: req.warehouse_id,
                                    quantity: req.quantity,
                                    status,
                                    unit_purchase_price: item.purchase_price,
                                    unit_selling_price: item.selling_price,
                                    total_cost,
                                    total_price,
                                    profit,
                                    serial_number: req.serial_number.clone(),
                                    notes: req.notes.clone(),
                                    requested_by: req.requested_by,
                                },
                            )
                            .await?;

                        let approval_id = if let Some((priority, role)) = gate.as_ref() {
                            let approval = repair_parts_approval::ActiveModel {
                                id: NotSet,
                                parts_used_id: Set(part.id),
                                repair_request_id: Set(req.repair_request_id),
                                status: Set(ApprovalStatus::Pending.as_ref().to_string()),
                                priority: Set(priority.as_ref().to_string()),
                                total_cost: Set(total_cost),
                                approver_role: Set(role.to_string()),
                                requested_by: Set(req.requested_by),
                                approved_by: NotSet,
                                reason: Set(req.notes.clone()),
                                requested_at: Set(Utc::now()),
                                reviewed_at: NotSet,
                            }
                            .insert(txn)
                            .await?;
                            Some(approval.id)
                        } else {
                            None
                        };

                        let invoice_item_id = match (req.invoice_id, req.invoice_item_id) {
                            (_, Some(existing)) => Some(existing),
                            (Some(invoice_id), None) => {
                                let line = invoice_item::ActiveModel {
                                    id: NotSet,
                                    invoice_id: Set(invoice_id),
                                    parts_used_id: Set(Some(part.id)),
                                    description: Set(item.name.clone()),
                                    quantity: Set(req.quantity),
                                    unit_price: Set(item.selling_price),
                                    total: Set(total_price),
                                    created_at: Set(Utc::now()),
                                }
                                .insert(txn)
                                .await?;
                                Some(line.id)
                            }
                            (None, None) => None,
                        };
                        if let Some(line_id) = invoice_item_id {
                            let mut active: parts_used::ActiveModel = part.clone().into();
                            active.invoice_item_id = Set(Some(line_id));
                            active.updated_at = Set(Utc::now());
                            active.update(txn).await?;
                        }

                        let repair_actual_cost =
                            rollup::recompute_repair_actual_cost(txn, req.repair_request_id)
                                .await?;

                        info!(
                            parts_used = part.id,
                            movement = movement.id,
                            new_quantity = level.quantity,
                            approval_required = approval_id.is_some(),
                            "part issued"
                        );

                        Ok((
                            IssuanceResult {
                                parts_used_id: part.id,
                                movement_id: movement.id,
                                stock_level: level,
                                total_cost,
                                total_price,
                                profit,
                                approval_required: approval_id.is_some(),
                                approval_id,
                                approval_priority: gate
                                    .as_ref()
                                    .map(|(p, _)| p.as_ref().to_string()),
                                approver_role: gate.map(|(_, r)| r.to_string()),
                                negative_stock,
                                repair_actual_cost,
                            },
                            alert.map(|(alert_type, severity)| {
                                (
                                    alert_type.as_ref().to_string(),
                                    severity.as_ref().to_string(),
                                )
                            }),
                        ))
                    })
                },
            )
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.publish_events(&request, &result, alert_raised).await;

        Ok(result)
    }

    async fn publish_events(
        &self,
        request: &IssuePartRequest,
        result: &IssuanceResult,
        alert_raised: Option<(String, String)>,
    ) {
        let issued = Event::PartIssued {
            parts_used_id: result.parts_used_id,
            repair_request_id: request.repair_request_id,
            inventory_item_id: request.inventory_item_id,
            warehouse_id: request.warehouse_id,
            quantity: request.quantity,
            new_quantity: result.stock_level.quantity,
            approval_required: result.approval_required,
            transaction_id: Uuid::new_v4(),
        };
        if let Err(e) = self.event_sender.send(issued).await {
            warn!("failed to publish issuance event: {}", e);
        }

        if let (Some(approval_id), Some(priority), Some(role)) = (
            result.approval_id,
            result.approval_priority.as_ref(),
            result.approver_role.as_ref(),
        ) {
            let event = Event::ApprovalRequested {
                approval_id,
                parts_used_id: result.parts_used_id,
                priority: priority.clone(),
                approver_role: role.clone(),
            };
            if let Err(e) = self.event_sender.send(event).await {
                warn!("failed to publish approval request event: {}", e);
            }
        }

        if result.negative_stock {
            let event = Event::NegativeStockIssued {
                inventory_item_id: request.inventory_item_id,
                warehouse_id: request.warehouse_id,
                new_quantity: result.stock_level.quantity,
            };
            if let Err(e) = self.event_sender.send(event).await {
                warn!("failed to publish negative stock event: {}", e);
            }
        }

        if let Some((alert_type, severity)) = alert_raised {
            let event = Event::StockAlertRaised {
                inventory_item_id: request.inventory_item_id,
                warehouse_id: request.warehouse_id,
                alert_type,
                severity,
            };
            if let Err(e) = self.event_sender.send(event).await {
                warn!("failed to publish stock alert event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_strict() {
        let policy = ApprovalPolicy::default();
        assert_eq!(policy.evaluate(dec!(500.00), dec!(10)), None);
        assert_eq!(
            policy.evaluate(dec!(500.01), dec!(10)),
            Some((ApprovalPriority::Normal, "supervisor"))
        );
    }

    #[test]
    fn cost_bands_escalate() {
        let policy = ApprovalPolicy::default();
        assert_eq!(
            policy.evaluate(dec!(600), dec!(10)),
            Some((ApprovalPriority::Normal, "supervisor"))
        );
        assert_eq!(
            policy.evaluate(dec!(1000.01), dec!(10)),
            Some((ApprovalPriority::High, "manager"))
        );
        assert_eq!(
            policy.evaluate(dec!(5000.01), dec!(10)),
            Some((ApprovalPriority::Urgent, "owner"))
        );
    }

    #[test]
    fn expensive_unit_gates_even_when_total_is_small() {
        let policy = ApprovalPolicy::default();
        // A zero-profit single unit below the cost threshold but above
        // the unit-price threshold still needs sign-off.
        assert_eq!(
            policy.evaluate(dec!(400), dec!(1200)),
            Some((ApprovalPriority::Normal, "supervisor"))
        );
        assert_eq!(policy.evaluate(dec!(400), dec!(1000)), None);
    }

    #[test]
    fn config_overrides_convert_to_decimal() {
        let thresholds = ApprovalThresholds {
            total_cost: 250.0,
            high_priority: 750.0,
            urgent_priority: 2000.0,
            unit_price: 500.0,
        };
        let policy = ApprovalPolicy::from(&thresholds);
        assert_eq!(
            policy.evaluate(dec!(300), dec!(10)),
            Some((ApprovalPriority::Normal, "supervisor"))
        );
        assert_eq!(
            policy.evaluate(dec!(2500), dec!(10)),
            Some((ApprovalPriority::Urgent, "owner"))
        );
    }
}
