//! Trading mutations.
//!
//! Every action mutation follows the same path: require a selected provider
//! and a connected wallet (their absence is a defect), build and validate the
//! request, call the API once, publish the returned action into
//! `pending_action` and invalidate the tags the action touches.

use std::sync::Arc;

use perpdeck_api::ApiClient;
use perpdeck_core::{
    Action, ActionArgs, ActionRequest, CancelOrderArgs, ClosePositionArgs, DepositArgs,
    EditLeverageArgs, OrderId, PlaceOrderArgs, SetTpSlArgs, WithdrawArgs,
};
use perpdeck_graph::{Ctx, Family, Graph, Mutation, NodeError, NodeResult, ReactivityTag};
use perpdeck_telemetry::Metrics;
use tracing::{debug, info};

use crate::atoms::TradingAtoms;
use crate::signing::SigningState;
use crate::tags;

/// Handles to every trading mutation.
#[derive(Clone)]
pub struct TradingMutations {
    pub place_order: Mutation<PlaceOrderArgs, Action>,
    pub close_position: Mutation<ClosePositionArgs, Action>,
    pub edit_leverage: Mutation<EditLeverageArgs, Action>,
    pub set_tp_sl: Mutation<SetTpSlArgs, Action>,
    /// One cancel flow per order id.
    pub cancel_order: Family<OrderId, Mutation<(), Action>>,
    pub deposit: Mutation<DepositArgs, Action>,
    pub withdraw: Mutation<WithdrawArgs, Action>,
    /// Sign the pending action's transactions and submit them.
    pub sign_pending_action: Mutation<(), Action>,
}

struct Deps {
    api: Arc<dyn ApiClient>,
    atoms: TradingAtoms,
}

impl TradingMutations {
    pub fn new(graph: &Graph, api: Arc<dyn ApiClient>, atoms: &TradingAtoms) -> Self {
        let deps = Arc::new(Deps {
            api,
            atoms: atoms.clone(),
        });

        let cancel_order = {
            let deps = deps.clone();
            Family::new(graph, move |graph, order_id: &OrderId| {
                let deps = deps.clone();
                let args = CancelOrderArgs {
                    order_id: order_id.clone(),
                };
                graph.mutation(format!("cancel_order/{order_id}"), move |ctx, ()| {
                    let deps = deps.clone();
                    let args = args.clone();
                    async move { execute(&ctx, &deps, &args).await }
                })
            })
        };

        let sign_pending_action = {
            let deps = deps.clone();
            graph.mutation("sign_pending_action", move |ctx, ()| {
                let deps = deps.clone();
                async move { sign_and_submit(&ctx, &deps).await }
            })
        };

        Self {
            place_order: action_mutation(graph, "place_order", deps.clone()),
            close_position: action_mutation(graph, "close_position", deps.clone()),
            edit_leverage: action_mutation(graph, "edit_leverage", deps.clone()),
            set_tp_sl: action_mutation(graph, "set_tp_sl", deps.clone()),
            cancel_order,
            deposit: action_mutation(graph, "deposit", deps.clone()),
            withdraw: action_mutation(graph, "withdraw", deps),
            sign_pending_action,
        }
    }

    /// Cancel flow for one order.
    pub fn cancel(&self, order_id: &OrderId) -> Mutation<(), Action> {
        self.cancel_order.get(order_id)
    }
}

fn action_mutation<A>(graph: &Graph, label: &str, deps: Arc<Deps>) -> Mutation<A, Action>
where
    A: ActionArgs + Send + Sync + 'static,
{
    graph.mutation(label, move |ctx, args: A| {
        let deps = deps.clone();
        async move { execute(&ctx, &deps, &args).await }
    })
}

async fn execute<A>(ctx: &Ctx, deps: &Deps, args: &A) -> NodeResult<Action>
where
    A: ActionArgs + Sync,
{
    let kind = A::KIND;
    let result = async {
        let provider = ctx
            .get(&deps.atoms.selected_provider)
            .await?
            .ok_or_else(|| NodeError::defect(format!("{kind}: no provider selected")))?;
        let address = ctx
            .get(&deps.atoms.wallet)
            .await?
            .address()
            .cloned()
            .ok_or_else(|| NodeError::defect(format!("{kind}: wallet not connected")))?;

        let request = ActionRequest::new(provider, address, args).map_err(NodeError::failed)?;
        debug!(kind = %kind, provider = %request.provider, "Submitting action");
        deps.api
            .execute_action(request)
            .await
            .map_err(NodeError::failed)
    }
    .await;

    match result {
        Ok(action) => {
            Metrics::action(kind.as_str(), "success");
            info!(
                action = %action.id,
                kind = %kind,
                status = ?action.status,
                transactions = action.transactions.len(),
                "Action created"
            );
            ctx.set(&deps.atoms.pending_action, Some(action.clone()));
            for tag in tags::affected_by(kind) {
                ctx.invalidate_tag(&ReactivityTag::from(*tag));
            }
            Ok(action)
        }
        Err(err) => {
            let outcome = if err.is_defect() { "defect" } else { "failure" };
            Metrics::action(kind.as_str(), outcome);
            Err(err)
        }
    }
}

async fn sign_and_submit(ctx: &Ctx, deps: &Deps) -> NodeResult<Action> {
    let atoms = &deps.atoms;
    let action = ctx
        .get(&atoms.pending_action)
        .await?
        .ok_or_else(|| NodeError::defect("no pending action to sign"))?;
    let signer = ctx
        .get(&atoms.wallet)
        .await?
        .signer()
        .ok_or_else(|| NodeError::defect("wallet not connected"))?;
    if signer.address() != &action.address {
        return Err(NodeError::defect(format!(
            "pending action {} belongs to {}, wallet is {}",
            action.id,
            action.address.short(),
            signer.address().short()
        )));
    }
    if !action.needs_signature() {
        debug!(action = %action.id, "Nothing to sign");
        return Ok(action);
    }

    let id = action.id.clone();
    let total = action.transactions.len();
    let result = async {
        ctx.set(
            &atoms.signing_state,
            SigningState::Signing {
                action: id.clone(),
                signed: 0,
                total,
            },
        );

        let mut signed = Vec::with_capacity(total);
        for tx in action.transactions.iter().cloned() {
            let batch = signer
                .sign_transactions(vec![tx])
                .await
                .map_err(NodeError::failed)?;
            signed.extend(batch);
            ctx.set(
                &atoms.signing_state,
                SigningState::Signing {
                    action: id.clone(),
                    signed: signed.len(),
                    total,
                },
            );
        }

        ctx.set(&atoms.signing_state, SigningState::Submitting { action: id.clone() });
        deps.api
            .submit_transactions(id.clone(), signed)
            .await
            .map_err(NodeError::failed)
    }
    .await;

    match result {
        Ok(updated) => {
            Metrics::action(updated.kind.as_str(), "submitted");
            info!(action = %id, status = ?updated.status, "Signed transactions submitted");
            ctx.set(&atoms.pending_action, Some(updated.clone()));
            ctx.set(&atoms.signing_state, SigningState::Submitted { action: id });
            for tag in [tags::POSITIONS, tags::ORDERS, tags::BALANCES] {
                ctx.invalidate_tag(&ReactivityTag::from(tag));
            }
            Ok(updated)
        }
        Err(err) => {
            Metrics::action(action.kind.as_str(), "failure");
            ctx.set(
                &atoms.signing_state,
                SigningState::Failed {
                    action: id,
                    reason: err.to_string(),
                },
            );
            Err(err)
        }
    }
}
