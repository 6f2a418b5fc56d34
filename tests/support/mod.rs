//! In-memory fakes and request helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::{
    auth::AuthService,
    comments::CommentService,
    feed::FeedService,
    follows::FollowService,
    pagination::PageRequest,
    posts::PostService,
    repos::{
        CommentQueryFilter, CommentsRepo, CreateCommentParams, CreateGroupParams,
        CreatePostParams, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostQueryFilter,
        PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
    },
};
use yatube::cache::{CacheConfig, CacheState, PageStore};
use yatube::domain::entities::{
    CommentRecord, FollowRecord, GroupRecord, GroupRef, PostRecord, UserRecord,
};
use yatube::infra::http::{AdminState, HttpState, build_admin_router, build_router};
use yatube::infra::uploads::UploadStorage;

pub const PASSWORD: &str = "correct horse battery";

/// Everything lives in vectors guarded by mutexes; listings walk the vector
/// in reverse so insertion order doubles as `pub_date DESC, id DESC`.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<Vec<UserRecord>>,
    groups: Mutex<Vec<GroupRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    follows: Mutex<Vec<FollowRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("store mutex")
}

fn page_slice<T: Clone>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

fn matches_search(text: &str, search: Option<&str>) -> bool {
    match search {
        Some(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

impl InMemoryStore {
    pub fn posts_len(&self) -> usize {
        lock(&self.posts).len()
    }

    pub fn comments_len(&self) -> usize {
        lock(&self.comments).len()
    }

    pub fn groups_len(&self) -> usize {
        lock(&self.groups).len()
    }

    pub fn follows_len(&self) -> usize {
        lock(&self.follows).len()
    }

    fn followed_authors(&self, user_id: Uuid) -> Vec<Uuid> {
        lock(&self.follows)
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .map(|edge| edge.author_id)
            .collect()
    }

    fn filtered_posts(&self, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let followed = filter.followed_by.map(|user_id| self.followed_authors(user_id));
        lock(&self.posts)
            .iter()
            .rev()
            .filter(|post| filter.author_id.is_none_or(|id| post.author_id == id))
            .filter(|post| {
                filter
                    .group_id
                    .is_none_or(|id| post.group.as_ref().is_some_and(|group| group.id == id))
            })
            .filter(|post| {
                followed
                    .as_ref()
                    .is_none_or(|authors| authors.contains(&post.author_id))
            })
            .filter(|post| matches_search(&post.text, filter.search.as_deref()))
            .cloned()
            .collect()
    }

    fn filtered_comments(&self, filter: &CommentQueryFilter) -> Vec<CommentRecord> {
        lock(&self.comments)
            .iter()
            .rev()
            .filter(|comment| filter.post_id.is_none_or(|id| comment.post_id == id))
            .filter(|comment| matches_search(&comment.text, filter.search.as_deref()))
            .cloned()
            .collect()
    }

    fn username_of(&self, user_id: Uuid) -> Result<String, RepoError> {
        lock(&self.users)
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::Integrity {
                message: "unknown user id".to_string(),
            })
    }

    fn group_ref(&self, group_id: Uuid) -> Option<GroupRef> {
        lock(&self.groups)
            .iter()
            .find(|group| group.id == group_id)
            .map(|group| GroupRef {
                id: group.id,
                title: group.title.clone(),
                slug: group.slug.clone(),
            })
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = lock(&self.users);
        if users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            password_hash: params.password_hash,
            joined_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(lock(&self.users)
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(lock(&self.users).iter().find(|user| user.id == id).cloned())
    }

    async fn count_users(&self) -> Result<u64, RepoError> {
        Ok(lock(&self.users).len() as u64)
    }
}

#[async_trait]
impl GroupsRepo for InMemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut groups = lock(&self.groups);
        if groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        groups.push(group.clone());
        Ok(group)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(lock(&self.groups)
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(lock(&self.groups).iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups: Vec<GroupRecord> = lock(&self.groups)
            .iter()
            .filter(|group| matches_search(&group.title, search))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(page_slice(groups, page))
    }

    async fn count_groups(&self, search: Option<&str>) -> Result<u64, RepoError> {
        Ok(lock(&self.groups)
            .iter()
            .filter(|group| matches_search(&group.title, search))
            .count() as u64)
    }
}

#[async_trait]
impl PostsRepo for InMemoryStore {
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(page_slice(self.filtered_posts(filter), page))
    }

    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        Ok(self.filtered_posts(filter).len() as u64)
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(lock(&self.posts).iter().find(|post| post.id == id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let author_username = self.username_of(params.author_id)?;
        let group = params.group_id.and_then(|id| self.group_ref(id));
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: params.text,
            author_id: params.author_id,
            author_username,
            group,
            image_path: params.image_path,
            pub_date: OffsetDateTime::now_utc(),
        };
        lock(&self.posts).push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let group = params.group_id.and_then(|id| self.group_ref(id));
        let mut posts = lock(&self.posts);
        let post = posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group = group;
        post.image_path = params.image_path;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let author_username = self.username_of(params.author_id)?;
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            author_username,
            text: params.text,
            created: OffsetDateTime::now_utc(),
        };
        lock(&self.comments).push(comment.clone());
        Ok(comment)
    }

    async fn list_comments_for_post(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(lock(&self.comments)
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(page_slice(self.filtered_comments(filter), page))
    }

    async fn count_comments(&self, filter: &CommentQueryFilter) -> Result<u64, RepoError> {
        Ok(self.filtered_comments(filter).len() as u64)
    }
}

#[async_trait]
impl FollowsRepo for InMemoryStore {
    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let user_username = self.username_of(user_id)?;
        let author_username = self.username_of(author_id)?;
        let mut follows = lock(&self.follows);
        if follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Ok(false);
        }
        follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            user_username,
            author_id,
            author_username,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut follows = lock(&self.follows);
        let before = follows.len();
        follows.retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(follows.len() != before)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(lock(&self.follows)
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn list_follows(&self, page: PageRequest) -> Result<Vec<FollowRecord>, RepoError> {
        let follows: Vec<FollowRecord> = lock(&self.follows).iter().rev().cloned().collect();
        Ok(page_slice(follows, page))
    }

    async fn count_follows(&self) -> Result<u64, RepoError> {
        Ok(lock(&self.follows).len() as u64)
    }
}

#[async_trait]
impl HealthRepo for InMemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct Session {
    pub user: UserRecord,
    pub cookie: String,
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub router: Router,
    pub admin_router: Router,
    pub auth: Arc<AuthService>,
    _media: tempfile::TempDir,
}

impl TestApp {
    pub fn spawn(cache_enabled: bool) -> Self {
        let store = Arc::new(InMemoryStore::default());

        let users: Arc<dyn UsersRepo> = store.clone();
        let groups: Arc<dyn GroupsRepo> = store.clone();
        let posts: Arc<dyn PostsRepo> = store.clone();
        let posts_write: Arc<dyn PostsWriteRepo> = store.clone();
        let comments: Arc<dyn CommentsRepo> = store.clone();
        let follows: Arc<dyn FollowsRepo> = store.clone();
        let health: Arc<dyn HealthRepo> = store.clone();

        let media = tempfile::tempdir().expect("media dir");
        let upload_storage = Arc::new(
            UploadStorage::new(media.path().to_path_buf()).expect("upload storage"),
        );

        let feed = Arc::new(FeedService::new(
            posts.clone(),
            groups.clone(),
            users.clone(),
            comments.clone(),
            follows.clone(),
            10,
        ));
        let auth = Arc::new(AuthService::new(users.clone()));
        let post_service = Arc::new(PostService::new(
            posts.clone(),
            posts_write,
            groups.clone(),
            upload_storage.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(comments.clone(), posts.clone()));
        let follow_service = Arc::new(FollowService::new(follows.clone(), users.clone()));

        let cache = cache_enabled.then(|| {
            let config = CacheConfig {
                enabled: true,
                ttl_seconds: 60,
                response_limit: 16,
            };
            CacheState {
                store: Arc::new(PageStore::new(&config)),
                config,
            }
        });

        let http_state = HttpState {
            feed,
            posts: post_service,
            comments: comment_service,
            follows: follow_service,
            auth: auth.clone(),
            groups: groups.clone(),
            health: health.clone(),
            upload_storage,
            cache: cache.clone(),
            upload_limit_bytes: 10 * 1024 * 1024,
        };
        let admin_state = AdminState {
            users,
            posts,
            groups,
            comments,
            follows,
            health,
            cache,
        };

        Self {
            store,
            router: build_router(http_state),
            admin_router: build_admin_router(admin_state),
            auth,
            _media: media,
        }
    }

    pub async fn signup(&self, username: &str) -> Session {
        let (user, token) = self
            .auth
            .signup(username, PASSWORD)
            .await
            .expect("signup succeeds");
        Session {
            user,
            cookie: format!("yatube_session={token}"),
        }
    }

    pub async fn seed_post(&self, author: &UserRecord, text: &str) -> PostRecord {
        self.store
            .create_post(CreatePostParams {
                text: text.to_string(),
                author_id: author.id,
                group_id: None,
                image_path: None,
            })
            .await
            .expect("post seeded")
    }

    pub async fn seed_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.store
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: String::new(),
            })
            .await
            .expect("group seeded")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request handled")
    }

    pub async fn send_admin(&self, request: Request<Body>) -> Response<Body> {
        self.admin_router
            .clone()
            .oneshot(request)
            .await
            .expect("admin request handled")
    }
}

pub fn get_request(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request built")
}

pub fn form_request(path: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request built")
}

pub const MULTIPART_BOUNDARY: &str = "yatube-test-boundary";

pub struct MultipartField {
    pub name: &'static str,
    pub filename: Option<&'static str>,
    pub content: Vec<u8>,
}

impl MultipartField {
    pub fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            content: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &'static str, filename: &'static str, content: &[u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            content: content.to_vec(),
        }
    }
}

pub fn multipart_request(
    path: &str,
    fields: Vec<MultipartField>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match field.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        field.name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&field.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).expect("request built")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collected")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location_header(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// A 1x1 PNG, the smallest payload `imagesize` accepts.
pub fn tiny_png() -> Bytes {
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];
    Bytes::from_static(PNG)
}
