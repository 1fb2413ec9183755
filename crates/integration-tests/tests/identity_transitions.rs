mod common;

use std::sync::Arc;
use std::time::Duration;

use domains::{CartMergePolicy, RemoteCartRepo, SessionIdentity, UserId};
use services::{CommerceOptions, Transition};
use tokio::sync::watch;

use common::Session;

fn with_policy(policy: CartMergePolicy) -> CommerceOptions {
    CommerceOptions {
        merge_policy: policy,
        ..common::options()
    }
}

#[tokio::test]
async fn test_guest_cart_of_two_survives_sign_in() {
    let session = Session::new(common::options());
    let phones = common::phones();
    session.stock(&phones);
    session.cart.add_to_cart(&phones[0].id).await.unwrap();
    session.cart.add_to_cart(&phones[1].id).await.unwrap();
    let guest_items = session.cart.items();

    let transition = session.reconciler.apply(common::user("u-1")).await;
    assert_eq!(transition, Transition::SignedIn(UserId::from("u-1")));

    assert_eq!(session.cart.items(), guest_items);
    assert_eq!(session.backend.stored_cart(&UserId::from("u-1")), guest_items);
}

#[tokio::test]
async fn test_sign_out_keeps_items_and_writes_locally() {
    let session = Session::new(common::options());
    let phones = common::phones();
    session.stock(&phones);
    let user = UserId::from("u-2");

    session.reconciler.apply(common::user("u-2")).await;
    session.cart.add_to_cart(&phones[2].id).await.unwrap();
    assert_eq!(session.backend.stored_cart(&user).len(), 1);

    let transition = session.reconciler.apply(SessionIdentity::Guest).await;
    assert_eq!(transition, Transition::SignedOut);
    assert_eq!(session.cart.total_item_count(), 1);

    session.cart.add_to_cart(&phones[2].id).await.unwrap();
    assert_eq!(session.backend.stored_cart(&user)[0].quantity, 1);
    assert_eq!(session.cart.total_item_count(), 2);
}

#[tokio::test]
async fn test_merge_policy_sums_shared_lines() {
    let session = Session::new(with_policy(CartMergePolicy::Merge));
    let phones = common::phones();
    session.stock(&phones);
    let user = UserId::from("u-3");

    let remote = vec![domains::CartLineItem::from_listing(&phones[0])];
    session.backend.replace_cart(&user, &remote).await.unwrap();

    session.cart.add_to_cart(&phones[0].id).await.unwrap();
    session.cart.add_to_cart(&phones[1].id).await.unwrap();
    session.reconciler.apply(common::user("u-3")).await;

    assert_eq!(session.cart.quantity_of(&phones[0].id), 2);
    assert_eq!(session.cart.quantity_of(&phones[1].id), 1);
    assert_eq!(session.backend.stored_cart(&user), session.cart.items());
}

#[tokio::test]
async fn test_prefer_remote_replaces_guest_cart() {
    let session = Session::new(with_policy(CartMergePolicy::PreferRemote));
    let phones = common::phones();
    session.stock(&phones);
    let user = UserId::from("u-4");

    let remote = vec![domains::CartLineItem::from_listing(&phones[3])];
    session.backend.replace_cart(&user, &remote).await.unwrap();
    session.cart.add_to_cart(&phones[0].id).await.unwrap();

    session.reconciler.apply(common::user("u-4")).await;
    assert_eq!(session.cart.items(), remote);
}

#[tokio::test]
async fn test_switching_users_never_leaks_a_cart() {
    let session = Session::new(common::options());
    let phones = common::phones();
    session.stock(&phones);
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let bobs_cart = vec![domains::CartLineItem::from_listing(&phones[3])];
    session.backend.replace_cart(&bob, &bobs_cart).await.unwrap();

    session.reconciler.apply(common::user("alice")).await;
    session.cart.add_to_cart(&phones[0].id).await.unwrap();

    let transition = session.reconciler.apply(common::user("bob")).await;
    assert_eq!(
        transition,
        Transition::Switched {
            from: alice.clone(),
            to: bob.clone()
        }
    );

    assert_eq!(session.backend.stored_cart(&bob), bobs_cart);
    assert_eq!(session.cart.items(), bobs_cart);
    assert_eq!(session.backend.stored_cart(&alice)[0].listing_id, phones[0].id);

    session.cart.add_to_cart(&phones[1].id).await.unwrap();
    assert_eq!(session.backend.stored_cart(&bob).len(), 2);
    assert_eq!(session.backend.stored_cart(&alice).len(), 1);
}

#[tokio::test]
async fn test_reconciler_follows_the_identity_channel() {
    let session = Session::new(common::options());
    let (tx, rx) = watch::channel(SessionIdentity::Guest);
    let task = tokio::spawn(Arc::clone(&session.reconciler).run(rx));

    tx.send(common::user("u-5")).unwrap();
    wait_for(|| session.cart.identity() == common::user("u-5")).await;
    assert_eq!(session.reconciler.current(), common::user("u-5"));

    tx.send(SessionIdentity::Guest).unwrap();
    wait_for(|| session.cart.identity().is_guest()).await;

    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("reconciler stops when the provider goes away")
        .unwrap();
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
