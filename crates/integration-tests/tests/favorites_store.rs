mod common;

use domains::{ListingId, MarketError, Notice, UserId};

use common::Session;

#[tokio::test]
async fn test_double_toggle_restores_state_and_pair_count() {
    let session = Session::new(common::options());
    let user = UserId::from("u-1");
    session.reconciler.apply(common::user("u-1")).await;

    let x = ListingId::from("ad-9");
    let before = session.backend.favorite_count(&user);

    assert!(session.favorites.toggle_favorite(&x).await.unwrap());
    assert_eq!(session.backend.favorite_count(&user), before + 1);
    assert!(!session.favorites.toggle_favorite(&x).await.unwrap());

    assert!(!session.favorites.is_favorite(&x));
    assert_eq!(session.backend.favorite_count(&user), before);
}

#[tokio::test]
async fn test_guest_toggle_is_rejected() {
    let session = Session::new(common::options());
    let x = ListingId::from("ad-9");

    let err = session.favorites.toggle_favorite(&x).await.unwrap_err();
    assert_eq!(err, MarketError::AuthenticationRequired);
    assert!(!session.favorites.is_favorite(&x));
    assert_eq!(session.notifier.take(), vec![Notice::SignInRequired]);
}

#[tokio::test]
async fn test_favorites_follow_the_user() {
    let session = Session::new(common::options());
    let x = ListingId::from("ad-1");

    session.reconciler.apply(common::user("alice")).await;
    session.favorites.toggle_favorite(&x).await.unwrap();

    session.reconciler.apply(common::user("bob")).await;
    assert_eq!(session.favorites.count(), 0);

    session.reconciler.apply(common::user("alice")).await;
    assert!(session.favorites.is_favorite(&x));

    session.reconciler.apply(domains::SessionIdentity::Guest).await;
    assert_eq!(session.favorites.count(), 0);
}
