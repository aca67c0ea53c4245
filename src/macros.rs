/**********************************************
  > File Name		: macros.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Fri 14 May 2021 10:34:16 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Unpin a page whatever the result of the work done on it.
 * The result of the work wins over an unpin error.
 */
#[macro_export]
macro_rules! unpin_after {
    ($pfh: expr, $page_num: expr, $dirty: expr, $work: expr) => {{
        let res = $work;
        let unpinned = if $dirty {
            $pfh.unpin_dirty_page($page_num)
        } else {
            $pfh.unpin_page($page_num)
        };
        match (res, unpinned) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e.into()),
            (Ok(v), Ok(())) => Ok(v),
        }
    }};
}

/*
 * Check a free list invariant in debug builds, log it and
 * return a corruption error if it does not hold.
 */
#[macro_export]
macro_rules! free_list_check {
    ($cond: expr, $($arg: tt)+) => {
        if cfg!(debug_assertions) && !$cond {
            let msg = format!($($arg)+);
            log::error!("{}", msg);
            return Err($crate::errors::RecordError::CorruptedFreeList(msg));
        }
    };
}
